//! Stages that run one external tool.

use super::Stage;
use crate::context::StageContext;
use crate::core::ExecutionOutcome;
use crate::runner::CommandSpec;
use async_trait::async_trait;

/// One argument of a tool command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Passed through unchanged.
    Literal(String),
    /// The target domain.
    Target,
    /// A file in the output directory this stage reads.
    Input(String),
    /// A file in the output directory this stage writes.
    Output(String),
}

/// A stage that runs one tool with a templated command line.
#[derive(Debug, Clone)]
pub struct ToolStage {
    name: String,
    tool: String,
    program: String,
    args: Vec<Arg>,
    stdin: Option<String>,
    stdout: Option<String>,
}

impl ToolStage {
    /// Creates a stage running `tool`, whose binary has the same name.
    #[must_use]
    pub fn new(name: impl Into<String>, tool: impl Into<String>) -> Self {
        let tool = tool.into();
        Self {
            name: name.into(),
            program: tool.clone(),
            tool,
            args: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    /// Sets the executable when it differs from the tool name.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Appends a literal argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Literal(arg.into()));
        self
    }

    /// Appends several literal arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|a| Arg::Literal(a.into())));
        self
    }

    /// Appends the target domain.
    #[must_use]
    pub fn target(mut self) -> Self {
        self.args.push(Arg::Target);
        self
    }

    /// Appends the path of an input file.
    #[must_use]
    pub fn input(mut self, file: impl Into<String>) -> Self {
        self.args.push(Arg::Input(file.into()));
        self
    }

    /// Appends the path of an output file.
    #[must_use]
    pub fn output(mut self, file: impl Into<String>) -> Self {
        self.args.push(Arg::Output(file.into()));
        self
    }

    /// Feeds an input file to stdin.
    #[must_use]
    pub fn stdin_from(mut self, file: impl Into<String>) -> Self {
        self.stdin = Some(file.into());
        self
    }

    /// Captures stdout into an output file.
    #[must_use]
    pub fn stdout_to(mut self, file: impl Into<String>) -> Self {
        self.stdout = Some(file.into());
        self
    }

    /// The argument template.
    #[must_use]
    pub fn arg_template(&self) -> &[Arg] {
        &self.args
    }

    /// Resolves the template against a stage context.
    #[must_use]
    pub fn command(&self, ctx: &StageContext) -> CommandSpec {
        let args = self.args.iter().map(|arg| match arg {
            Arg::Literal(value) => value.clone(),
            Arg::Target => ctx.target().to_string(),
            Arg::Input(file) | Arg::Output(file) => ctx.output_file(file).display().to_string(),
        });

        let mut command = CommandSpec::new(&self.program).args(args);
        if let Some(ref file) = self.stdin {
            command = command.stdin_file(ctx.output_file(file));
        }
        if let Some(ref file) = self.stdout {
            command = command.stdout_file(ctx.output_file(file));
        }
        command
    }
}

#[async_trait]
impl Stage for ToolStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool(&self) -> &str {
        &self.tool
    }

    fn reads(&self) -> Vec<String> {
        let args = self.args.iter().filter_map(|arg| match arg {
            Arg::Input(file) => Some(file.clone()),
            _ => None,
        });
        args.chain(self.stdin.clone()).collect()
    }

    fn writes(&self) -> Vec<String> {
        let args = self.args.iter().filter_map(|arg| match arg {
            Arg::Output(file) => Some(file.clone()),
            _ => None,
        });
        args.chain(self.stdout.clone()).collect()
    }

    async fn execute(&self, ctx: &StageContext) -> ExecutionOutcome {
        let command = self.command(ctx);
        ctx.runner()
            .execute(&self.name, &self.tool, &command, ctx.timeout(), ctx.cancellation())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineContext;
    use crate::core::ExecutionMode;
    use crate::run::{Run, Target};
    use crate::runner::StageRunner;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn stage_context(root: &std::path::Path, name: &str) -> StageContext {
        let target = Target::parse(Some("example.com")).unwrap();
        let run = Arc::new(Run::new(target, root, ExecutionMode::Sequential));
        std::fs::create_dir_all(run.output_dir()).unwrap();
        let ctx = PipelineContext::new(run, Arc::new(StageRunner::new()));
        StageContext::new(Arc::new(ctx), name, None)
    }

    #[test]
    fn test_reads_and_writes_from_template() {
        let stage = ToolStage::new("xss", "bxss")
            .arg("-payload")
            .arg("x")
            .input("params.txt")
            .stdin_from("urls.txt")
            .stdout_to("xss.txt");

        assert_eq!(stage.name(), "xss");
        assert_eq!(stage.tool(), "bxss");
        assert_eq!(stage.reads(), vec!["params.txt", "urls.txt"]);
        assert_eq!(stage.writes(), vec!["xss.txt"]);
    }

    #[test]
    fn test_command_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = stage_context(dir.path(), "subdomains");
        let stage = ToolStage::new("subdomains", "subfinder")
            .arg("-d")
            .target()
            .arg("-o")
            .output("subs.txt");

        let command = stage.command(&ctx);
        assert_eq!(command.program, "subfinder");
        assert_eq!(
            command.args,
            vec![
                "-d".to_string(),
                "example.com".to_string(),
                "-o".to_string(),
                ctx.output_file("subs.txt").display().to_string(),
            ]
        );
        assert_eq!(command.stdin, None);
    }

    #[tokio::test]
    async fn test_execute_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = stage_context(dir.path(), "echo");
        let stage = ToolStage::new("echo", "sh")
            .arg("-c")
            .arg("printf '%s' \"$0\"")
            .target()
            .stdout_to("echo.txt");

        let outcome = stage.execute(&ctx).await;

        assert!(outcome.is_success(), "{outcome:?}");
        let written = std::fs::read_to_string(ctx.output_file("echo.txt")).unwrap();
        assert_eq!(written, "example.com");
    }

    #[tokio::test]
    async fn test_execute_missing_tool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = stage_context(dir.path(), "ghost");
        let stage = ToolStage::new("ghost", "reconflow-no-such-tool").arg("-h");

        let outcome = stage.execute(&ctx).await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.tool, "reconflow-no-such-tool");
    }
}
