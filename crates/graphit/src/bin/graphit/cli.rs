//! graphit cli interface

use clap::Parser;
use std::path::PathBuf;

/// Draw a LinuxKit manifest and the bind mounts of its containers
///
/// Image labels are read with `docker` (override with GRAPHIT_RUNTIME), diagrams other than
/// .dot/.gv are laid out with graphviz `dot` (override with GRAPHIT_DOT).
/// Log verbosity is controlled by GRAPHIT_LOG.
#[derive(Parser, Debug)]
#[command(override_usage = "graphit -i <Linuxkit yml> -o <Diagram SVG>")]
pub struct Cli {
    /// LinuxKit manifest to read
    #[clap(short = 'i', long = "ifile")]
    pub ifile: PathBuf,

    /// Diagram to write, the extension selects the format
    #[clap(short = 'o', long = "ofile")]
    pub ofile: PathBuf,
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn flags() {
        let cli = Cli::try_parse_from(["graphit", "-i", "linuxkit.yml", "--ofile", "out.svg"])
            .unwrap();
        assert_eq!(cli.ifile, PathBuf::from("linuxkit.yml"));
        assert_eq!(cli.ofile, PathBuf::from("out.svg"));
    }

    #[test]
    fn help_and_unknown_flags() {
        let help = Cli::try_parse_from(["graphit", "-h"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        assert_eq!(help.exit_code(), 0);

        let unknown = Cli::try_parse_from(["graphit", "-i", "a", "-o", "b", "--verbose"]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::UnknownArgument);
        assert_eq!(unknown.exit_code(), 2);

        let missing = Cli::try_parse_from(["graphit", "-i", "a"]).unwrap_err();
        assert_eq!(missing.exit_code(), 2);
    }

    #[test]
    fn no_version_flag() {
        let error = Cli::try_parse_from(["graphit", "-V"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownArgument);
    }
}
