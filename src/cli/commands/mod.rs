//! Command execution.
//!
//! The only command runs the packaging pipeline and reports each stage.

mod package;

use crate::cli::{Args, RuntimeConfig};
use crate::error::{CliError, Result};

use package::execute_package;

/// Execute the packaging run described by the parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    let config = RuntimeConfig::from(&args);

    let result = match args.validate() {
        Ok(()) => execute_package(&args, &config).await,
        Err(reason) => Err(CliError::InvalidArguments { reason }.into()),
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!("Packaging failed: {}", e));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.indent(&format!("• {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}
