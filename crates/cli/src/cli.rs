use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use erlcheck_core::{NamingMode, RemoteTarget};

#[derive(Parser, Debug)]
#[command(name = "erlcheck")]
#[command(version, about = "Check Erlang source files the way their build would compile them")]
#[command(after_help = "EXIT STATUS:\n    0  every file passed\n    1  at least one file failed\n    2  usage error\n\n\
ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Cli {
    /// Log resolution and configuration details to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Write compiled modules to DIR instead of only checking them
    #[arg(long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Do not write compiled modules (overrides --outdir)
    #[arg(long)]
    pub nooutdir: bool,

    /// Report calls to undefined functions
    #[arg(long)]
    pub xref: bool,

    /// Hot-load each compiled module into a running node
    #[arg(long, num_args = 3, value_names = ["NAMING", "MYNAME", "TARGETNAME"])]
    pub load: Option<Vec<String>>,

    /// Cookie for the node given to --load
    #[arg(long, value_name = "SECRET", requires = "load")]
    pub cookie: Option<String>,

    /// Copy each compiled module over same-named files under DIR
    #[arg(long, value_name = "DIR")]
    pub copy: Option<PathBuf>,

    /// Erlang source files to check
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Output directory after `--nooutdir` is applied.
    pub fn effective_outdir(&self) -> Option<&PathBuf> {
        if self.nooutdir {
            None
        } else {
            self.outdir.as_ref()
        }
    }

    /// The `--load` target, validated like any other argument.
    pub fn remote_target(&self) -> Result<Option<RemoteTarget>, clap::Error> {
        let Some(load) = &self.load else {
            return Ok(None);
        };
        let [naming, local_node, remote_node] = load.as_slice() else {
            return Err(Self::command().error(
                ErrorKind::WrongNumberOfValues,
                "--load takes NAMING MYNAME TARGETNAME",
            ));
        };
        let naming: NamingMode = naming
            .parse()
            .map_err(|e: String| Self::command().error(ErrorKind::InvalidValue, e))?;

        Ok(Some(RemoteTarget {
            naming,
            local_node: local_node.clone(),
            remote_node: remote_node.clone(),
            cookie: self.cookie.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "erlcheck", "-v", "--outdir", "ebin", "--xref", "--load", "shortnames", "me",
            "app@host", "--cookie", "secret", "--copy", "/targets", "--", "src/a.erl",
            "src/b.erl",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(cli.xref);
        assert_eq!(cli.effective_outdir(), Some(&PathBuf::from("ebin")));
        assert_eq!(cli.copy, Some(PathBuf::from("/targets")));
        assert_eq!(
            cli.files,
            vec![PathBuf::from("src/a.erl"), PathBuf::from("src/b.erl")]
        );
        assert_eq!(
            cli.remote_target().unwrap(),
            Some(RemoteTarget {
                naming: NamingMode::Short,
                local_node: "me".to_string(),
                remote_node: "app@host".to_string(),
                cookie: Some("secret".to_string()),
            })
        );
    }

    #[test]
    fn test_nooutdir_overrides_outdir() {
        let cli =
            Cli::try_parse_from(["erlcheck", "--outdir", "ebin", "--nooutdir", "a.erl"]).unwrap();
        assert_eq!(cli.effective_outdir(), None);
    }

    #[test]
    fn test_usage_errors() {
        for args in [
            vec!["erlcheck"],
            vec!["erlcheck", "--bogus", "a.erl"],
            vec!["erlcheck", "--load", "shortnames", "me"],
            vec!["erlcheck", "--outdir"],
        ] {
            assert!(Cli::try_parse_from(&args).is_err(), "{args:?}");
        }
    }

    #[test]
    fn test_invalid_naming_mode() {
        let cli =
            Cli::try_parse_from(["erlcheck", "--load", "medium", "me", "app", "a.erl"]).unwrap();
        let err = cli.remote_target().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
