use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use log::{debug, error};

use som::{Shell, Universe, UniverseCreateInfo, Unwind};

#[derive(ClapParser, Debug)]
#[command(author, version, about = "A SOM Smalltalk interpreter", long_about = None)]
struct Cli {
    /// Directories searched for classes, separated by ':'
    #[arg(short = 'c', long = "classpath", value_delimiter = ':')]
    class_path: Vec<PathBuf>,

    /// Print every loaded method as a Graphviz graph
    #[arg(short = 'd', long)]
    dump_ast: bool,

    /// Start the shell after the given class has run
    #[arg(long)]
    repl: bool,

    /// The class to run, optionally as a path to its .som file, followed by
    /// its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Split `dir/Name.som` into the directory to search and the class name.
fn split_class_argument(argument: &str) -> Result<(Option<PathBuf>, String), String> {
    let path = Path::new(argument);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("not a class name: {}", argument))?;
    let mut parts = file_name.split('.');
    let class_name = parts.next().unwrap_or_default().to_string();
    if parts.count() > 1 {
        return Err(format!("class with . in its name? {}", file_name));
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);
    Ok((dir, class_name))
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut class_path = cli.class_path;
    let mut args = cli.args;
    if let Some(first) = args.first_mut() {
        match split_class_argument(first) {
            Ok((dir, class_name)) => {
                if let Some(dir) = dir {
                    class_path.insert(0, dir);
                }
                *first = class_name;
            }
            Err(err) => {
                eprintln!("{}", err);
                return ExitCode::FAILURE;
            }
        }
    }
    class_path.push(PathBuf::from("."));
    debug!("class path: {:?}", class_path);

    let u = match Universe::new(UniverseCreateInfo {
        class_path,
        dump_ast: cli.dump_ast,
    }) {
        Ok(u) => u,
        Err(err) => {
            error!("bootstrap failed");
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut result = if args.is_empty() {
        Ok(som::Value::Nil)
    } else {
        u.execute(&args)
    };
    if result.is_ok() && (args.is_empty() || cli.repl) {
        let stdin = io::stdin();
        result = Shell::new(&u).start(stdin.lock());
    }

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(Unwind::Exit(code)) => exit_code(code),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_argument_splits_into_dir_and_name() {
        assert_eq!(
            split_class_argument("tests/Hello.som"),
            Ok((Some(PathBuf::from("tests")), "Hello".to_string()))
        );
        assert_eq!(split_class_argument("Hello"), Ok((None, "Hello".to_string())));
        assert!(split_class_argument("a/Hello.som.bak").is_err());
    }
}
