use std::{
    ffi::OsStr,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::error::Error;
use crate::parser;
use crate::translator::Translator;

pub struct Config {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Only honoured for a single file; directories always bootstrap.
    pub bootstrap: bool,
    pub entry: String,
    pub annotate: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnitSummary {
    pub name: String,
    pub commands: usize,
    pub statics: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Dir { dir: PathBuf, sources: Vec<PathBuf> },
}

impl Input {
    pub fn sources(&self) -> &[PathBuf] {
        match self {
            Input::File(path) => std::slice::from_ref(path),
            Input::Dir { sources, .. } => sources,
        }
    }
}

fn is_vm(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("vm"))
}

fn collect_sources(dir: &Path, sources: &mut Vec<PathBuf>) -> Result<(), Error> {
    for entry in fs::read_dir(dir).map_err(Error::io(dir))? {
        let path = entry.map_err(Error::io(dir))?.path();
        if path.is_dir() {
            collect_sources(&path, sources)?;
        } else if is_vm(&path) {
            sources.push(path);
        }
    }
    Ok(())
}

/// Resolve the input path to the VM sources it names, sorted by path.
pub fn discover(input: &Path) -> Result<Input, Error> {
    if input.is_file() {
        if is_vm(input) {
            return Ok(Input::File(input.to_path_buf()));
        }
    } else if input.is_dir() {
        let mut sources = Vec::new();
        collect_sources(input, &mut sources)?;
        if sources.is_empty() {
            return Err(Error::NoSources(input.to_path_buf()));
        }
        sources.sort();
        return Ok(Input::Dir {
            dir: input.to_path_buf(),
            sources,
        });
    }
    Err(Error::InvalidInput(input.to_path_buf()))
}

pub fn unit_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `Foo.vm` becomes `Foo.asm`; a directory `Dir` becomes `Dir/Dir.asm`.
pub fn default_output(input: &Input) -> PathBuf {
    match input {
        Input::File(path) => path.with_extension("asm"),
        Input::Dir { dir, .. } => {
            let name = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .or_else(|| {
                    dir.canonicalize()
                        .ok()
                        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                })
                .unwrap_or_else(|| "out".to_string());
            dir.join(format!("{}.asm", name))
        }
    }
}

/// Translate `sources` in order into `out`, returning it with one summary per unit.
pub fn translate<W: Write>(
    sources: &[PathBuf],
    entry: Option<&str>,
    annotate: bool,
    out: W,
) -> Result<(W, Vec<UnitSummary>), Error> {
    let sink = PathBuf::from("<output>");
    let mut translator = Translator::new(out).annotate(annotate);
    if let Some(entry) = entry {
        translator.bootstrap(entry).map_err(Error::io(&sink))?;
    }

    let mut summaries = Vec::with_capacity(sources.len());
    for path in sources {
        let text = fs::read_to_string(path).map_err(Error::io(path))?;
        let name = unit_name(path);
        translator.begin_unit(&name);

        let mut commands = 0;
        for command in parser::parse(&text) {
            let command = command.map_err(|source| Error::Parse {
                path: path.clone(),
                source,
            })?;
            translator.translate(&command).map_err(Error::io(&sink))?;
            commands += 1;
        }

        let summary = UnitSummary {
            name,
            commands,
            statics: translator.statics().len(),
        };
        debug!(
            "{}: {} commands, {} statics",
            summary.name, summary.commands, summary.statics
        );
        summaries.push(summary);
    }

    let out = translator.into_inner().map_err(Error::io(&sink))?;
    Ok((out, summaries))
}

/// Translate the configured input and write the assembly file.
///
/// Nothing is written unless every unit translates.
pub fn run(config: &Config) -> Result<(PathBuf, Vec<UnitSummary>), Error> {
    let input = discover(&config.input)?;
    let bootstrap = match &input {
        Input::File(_) => config.bootstrap,
        Input::Dir { dir, .. } => {
            if !config.bootstrap {
                warn!("{}: directories are always bootstrapped", dir.display());
            }
            true
        }
    };
    for source in input.sources() {
        info!("translating {}", source.display());
    }

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output(&input));
    let entry = bootstrap.then_some(config.entry.as_str());
    let (asm, summaries) = translate(input.sources(), entry, config.annotate, Vec::new())?;

    fs::write(&output, asm).map_err(Error::io(&output))?;
    info!("wrote {}", output.display());
    Ok((output, summaries))
}
