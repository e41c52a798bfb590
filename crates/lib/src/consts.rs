pub const APP_NAME: &str = "crossbundle";

/// Default project file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "crossbundle.toml";

/// Environment variable that replaces the configured container runtime program.
pub const CONTAINER_RUNTIME_ENV: &str = "CROSSBUNDLE_CONTAINER_RUNTIME";

/// Mount point of the source directory inside the build container (read-only).
pub const ASSET_INPUT_DIR: &str = "/asset-input";

/// Mount point of the output directory inside the build container (read-write).
pub const ASSET_OUTPUT_DIR: &str = "/asset-output";

/// Length of the truncated manifest hash.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;
