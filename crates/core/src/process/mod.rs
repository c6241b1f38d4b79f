//! Subprocess plumbing shared by the compiler, build-tool and erl helpers

mod command;
mod runner;

pub use command::CommandSpec;
pub use runner::{ProcessOutput, ProcessRunner, SystemRunner};

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::{CommandSpec, ProcessOutput, ProcessRunner};
    use crate::error::Result;

    /// Runner that records commands and replays canned outputs in order.
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub calls: RefCell<Vec<CommandSpec>>,
        pub outputs: RefCell<VecDeque<ProcessOutput>>,
    }

    impl ScriptedRunner {
        pub fn with_outputs(outputs: Vec<ProcessOutput>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                outputs: RefCell::new(outputs.into()),
            }
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec, _timeout: Option<Duration>) -> Result<ProcessOutput> {
            self.calls.borrow_mut().push(spec.clone());
            Ok(self.outputs.borrow_mut().pop_front().unwrap_or_default())
        }
    }

    pub fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    pub fn failed(code: i32, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(code),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }
}
