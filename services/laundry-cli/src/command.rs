//! Command-line parsing
//!
//! `laundry-api [--config PATH] <command> [args]`

use reqwest::Method;

pub const USAGE: &str = "usage: laundry-api [--config PATH] <command>

commands:
  login EMAIL PASSWORD
  logout
  whoami
  get PATH
  post PATH [JSON]
  put PATH [JSON]
  patch PATH [JSON]
  delete PATH";

#[derive(Debug, PartialEq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    Whoami,
    Call {
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    },
}

#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub command: Command,
}

fn usage(reason: impl Into<String>) -> common::Error {
    common::Error::Usage(reason.into())
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> common::Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args
                .next()
                .ok_or_else(|| usage("--config needs a path"))?;
            config_path = Some(path);
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or_else(|| usage("missing command"))?;
    let rest: Vec<String> = positional.collect();

    let command = match (name.as_str(), rest.as_slice()) {
        ("login", [email, password]) => Command::Login {
            email: email.clone(),
            password: password.clone(),
        },
        ("logout", []) => Command::Logout,
        ("whoami", []) => Command::Whoami,
        ("get", [path]) => call(Method::GET, path, None)?,
        ("delete", [path]) => call(Method::DELETE, path, None)?,
        ("post", [path, body @ ..]) if body.len() <= 1 => call(Method::POST, path, body.first())?,
        ("put", [path, body @ ..]) if body.len() <= 1 => call(Method::PUT, path, body.first())?,
        ("patch", [path, body @ ..]) if body.len() <= 1 => {
            call(Method::PATCH, path, body.first())?
        }
        ("login" | "logout" | "whoami" | "get" | "delete" | "post" | "put" | "patch", _) => {
            return Err(usage(format!("wrong arguments for `{name}`")));
        }
        _ => return Err(usage(format!("unknown command `{name}`"))),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn call(method: Method, path: &str, body: Option<&String>) -> common::Result<Command> {
    let body = body
        .map(|raw| serde_json::from_str::<serde_json::Value>(raw))
        .transpose()
        .map_err(|e| usage(format!("request body is not valid JSON: {e}")))?;
    Ok(Command::Call {
        method,
        path: path.to_owned(),
        body,
    })
}
