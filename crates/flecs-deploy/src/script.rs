//! Script steps

use crate::definition::split_command;
use crate::error::{DeployError, Result};
use flecs_core::ScriptStep;
use tokio::process::Command;
use tracing::info;

/// Program and arguments for a script step
pub(crate) fn script_command(step: &ScriptStep) -> Result<Vec<String>> {
    let path = step.path.as_deref().filter(|p| !p.is_empty());
    let inline = step.inline.as_deref().filter(|i| !i.trim().is_empty());

    match (path, inline) {
        (Some(path), None) => Ok(vec!["bash".to_string(), path.to_string()]),
        (None, Some(inline)) => split_command(inline),
        (Some(_), Some(_)) => Err(DeployError::Validation(
            "script step sets both path and inline".to_string(),
        )),
        (None, None) => Err(DeployError::Validation(
            "script step needs a path or an inline command".to_string(),
        )),
    }
}

/// Run the script in the current directory and fail on a non-zero exit
pub(crate) async fn run_script(step: &ScriptStep) -> Result<()> {
    let argv = script_command(step)?;
    let Some((program, args)) = argv.split_first() else {
        return Err(DeployError::Validation("script step is empty".to_string()));
    };

    info!(script = step.name.as_deref().unwrap_or(program.as_str()), "Running script");
    let status = Command::new(program).args(args).status().await?;

    if !status.success() {
        return Err(DeployError::Script(format!(
            "`{}` exited with {}",
            shell_words::join(&argv),
            status
        )));
    }
    Ok(())
}
