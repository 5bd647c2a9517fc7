mod settings;

pub use settings::{
    AgentConfig, BuiltinModeSetting, GitConfig, HooksConfig, NotificationConfig, WardenConfig,
    WardenPaths, WorkspaceConfig, CONFIG_FILE,
};
