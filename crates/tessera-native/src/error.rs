use thiserror::Error;
use cranelift_codegen::settings::SetError;
use tessera_ir::CompressionError;

/// Errors that can occur during native code generation.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("Failed during module processing: {0}")]
    CraneliftModule(#[from] cranelift_module::ModuleError),

    #[error("Failed to configure Cranelift settings: {0}")]
    SettingsError(#[from] SetError),

    #[error("ISA setup failed: {0}")]
    IsaSetupError(String),

    #[error("Malformed IR: {0}")]
    Ir(#[from] CompressionError),

    #[error("Type error during translation: {0}")]
    TypeError(String),

    #[error("Feature not yet implemented: {0}")]
    Unimplemented(String),
}
