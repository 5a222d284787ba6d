//! Command-line construction for the extractor process

use crate::config::{ExtractorConfig, ExtractorProgram};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use tokio::process::Command;

/// JVM flag pdffigures2 needs to render some colour profiles
const JAVA_CMM_FLAG: &str = "-Dsun.java2d.cmm=sun.java2d.cmm.kcms.KcmsServiceProvider";

/// Builder for one extractor invocation.
///
/// The resulting command line is
/// `<tool> <input.pdf> -m <out/> -d <out/> --dpi <dpi>`, where `<tool>` is
/// either the configured binary or `java <opts> -jar <jar>`.
#[derive(Debug)]
pub struct ExtractorCommand<'a> {
    config: &'a ExtractorConfig,
}

impl<'a> ExtractorCommand<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self { config }
    }

    /// Executable that will be spawned
    pub fn program(&self) -> &'a Path {
        match &self.config.program {
            ExtractorProgram::Jar { java, .. } => java,
            ExtractorProgram::Binary(path) => path,
        }
    }

    /// Full argument list, excluding the program itself
    pub fn args(&self, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if let ExtractorProgram::Jar { java_opts, jar, .. } = &self.config.program {
            args.extend(java_opts.iter().map(OsString::from));
            args.push(JAVA_CMM_FLAG.into());
            args.push("-jar".into());
            args.push(jar.into());
        }

        let prefix = dir_prefix(out_dir);
        args.push(input.into());
        args.push("-m".into());
        args.push(prefix.clone());
        args.push("-d".into());
        args.push(prefix);
        args.push("--dpi".into());
        args.push(self.config.dpi.to_string().into());
        args
    }

    /// Build the final Command ready for execution
    pub fn build(&self, input: &Path, out_dir: &Path) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(self.args(input, out_dir));
        if let Some(work_dir) = self.config.work_dir.as_deref().filter(|dir| dir.is_dir()) {
            cmd.current_dir(work_dir);
        }
        cmd
    }
}

/// pdffigures2 treats `-m`/`-d` as filename prefixes, so directories must
/// end with a separator
fn dir_prefix(dir: &Path) -> OsString {
    let mut prefix = dir.as_os_str().to_owned();
    let ends_with_separator = dir
        .to_str()
        .is_some_and(|s| s.ends_with(std::path::is_separator));
    if !ends_with_separator {
        prefix.push(OsStr::new(std::path::MAIN_SEPARATOR_STR));
    }
    prefix
}
