use std::path::Path;

use tracing::warn;

use crate::consts::DEFAULT_CONFIG_BRANCH;
use crate::runner::{Environment, ExternalCommand, ScriptRunner};

/// Current branch of the orchestration configuration, slashes turned into dashes.
///
/// Falls back to `master` when the configuration is not in a git checkout or
/// git cannot be run.
pub async fn config_branch<R: ScriptRunner>(runner: &R, env: &Environment, dotdir: Option<&Path>) -> String {
  let Some(dotdir) = dotdir else {
    warn!("no configuration directory set, defaulting to `{}` as branch name", DEFAULT_CONFIG_BRANCH);
    return DEFAULT_CONFIG_BRANCH.to_string();
  };

  let cmd = ExternalCommand::new("git")
    .arg("-C")
    .path_arg(dotdir)
    .args(["rev-parse", "--abbrev-ref", "HEAD"])
    .captured();

  match runner.run(&cmd, env).await {
    Ok(output) if output.success() && !output.stdout.trim().is_empty() => output.stdout.trim().replace('/', "-"),
    _ => {
      warn!(
        dotdir = ?dotdir,
        "configuration is not inside a git repository, defaulting to `{}` as branch name", DEFAULT_CONFIG_BRANCH
      );
      DEFAULT_CONFIG_BRANCH.to_string()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::RecordingRunner;
  use tracing_test::traced_test;

  #[tokio::test]
  async fn uses_git_branch_with_dashes() {
    let runner = RecordingRunner::default().with_output("git", "release/2024\n");
    let branch = config_branch(&runner, &Environment::new(), Some(Path::new("/cfg"))).await;

    assert_eq!(branch, "release-2024");
    assert_eq!(runner.commands(), vec!["git -C /cfg rev-parse --abbrev-ref HEAD".to_string()]);
  }

  #[tokio::test]
  #[traced_test]
  async fn defaults_to_master() {
    let env = Environment::new();
    assert_eq!(config_branch(&RecordingRunner::failing("git"), &env, Some(Path::new("/cfg"))).await, "master");

    let runner = RecordingRunner::default().with_output("git", "main\n");
    assert_eq!(config_branch(&runner, &env, None).await, "master");
    assert!(runner.commands().is_empty());
    assert!(logs_contain("defaulting to `master` as branch name"));
  }
}
