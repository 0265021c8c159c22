//! The command-line interface: one routed function driven by an argument
//! vector.
//!
//! The `clap` command is built from the route's parameters: required
//! parameters become positionals, optional ones become `--name` options with
//! a unique single-letter short form, boolean defaults and flag types become
//! switches, list types are repeatable, choice types restrict their values.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Arc;

use clap::builder::PossibleValuesParser;
use clap::error::ErrorKind as ClapErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Call, Content, Endpoint, Failure, InterfaceCore, ParameterRole, RequirementContext, Scope};
use crate::api::Api;
use crate::context::{Context, InterfaceKind, Outcome};
use crate::directives::DirectiveValues;
use crate::error::{ApiError, Error};
use crate::format::output::{OutputFormatRef, Payload};
use crate::http::Body;
use crate::route::RouteSpec;
use crate::transform::TransformContext;
use crate::types::{display, CliBehaviour};

/// Exit status used for validation failures.
pub const INVALID_EXIT_CODE: i32 = 1;

/// A function exposed as a command.
pub struct CliInterface {
    core: InterfaceCore,
    name: String,
    version: Option<String>,
    output: Option<OutputFormatRef>,
}

enum Finished {
    Completed(Value),
    Invalid(Map<String, Value>),
    Lacking(Value),
}

impl CliInterface {
    #[must_use]
    pub fn new(api: &Api, endpoint: &Endpoint, spec: &RouteSpec) -> Self {
        Self {
            core: InterfaceCore::new(api, endpoint, spec),
            name: spec
                .name
                .clone()
                .unwrap_or_else(|| endpoint.name().to_string()),
            version: spec.version.clone(),
            output: spec.output.clone(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn core(&self) -> &InterfaceCore {
        &self.core
    }

    fn behaviour(&self, name: &str, role: &ParameterRole) -> CliBehaviour {
        let behaviour = match role {
            ParameterRole::Validator(ty) => ty.cli(),
            _ => CliBehaviour::Value,
        };
        match (behaviour, self.core.defaults().get(name)) {
            (CliBehaviour::Value, Some(Value::Bool(_))) => CliBehaviour::Flag,
            (behaviour, _) => behaviour,
        }
    }

    /// The `clap` command for this function.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut command = Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_version_flag(true);
        if let Some(about) = self.core.documentation_text() {
            command = command.about(about.to_string());
        }

        let mut used_shorts: HashSet<char> = HashSet::from(['h']);
        if let Some(version) = &self.version {
            used_shorts.insert('v');
            command = command.version(version.clone()).arg(
                Arg::new("version")
                    .short('v')
                    .long("version")
                    .action(ArgAction::Version)
                    .help("Print version"),
            );
        }

        for (name, role) in self.core.roles() {
            if matches!(role, ParameterRole::Directive(_)) {
                continue;
            }
            let help = match role {
                ParameterRole::Validator(ty) => ty.doc(),
                _ => "Basic text / string value".to_string(),
            };
            let behaviour = self.behaviour(name, role);
            let mut arg = Arg::new(name.clone()).help(help);

            if self.core.required().contains(name) {
                arg = match behaviour {
                    CliBehaviour::Append => arg.num_args(1..).action(ArgAction::Append),
                    _ => arg,
                }
                .required(true);
            } else {
                arg = arg.long(name.clone());
                if let Some(short) = name.chars().next().filter(|c| c.is_ascii_alphanumeric()) {
                    if used_shorts.insert(short) {
                        arg = arg.short(short);
                    }
                }
                arg = match behaviour {
                    CliBehaviour::Flag => arg.action(ArgAction::SetTrue),
                    CliBehaviour::Append => arg.action(ArgAction::Append),
                    CliBehaviour::Choices(choices) => arg.value_parser(PossibleValuesParser::new(choices)),
                    CliBehaviour::Value => arg,
                };
            }
            command = command.arg(arg);
        }

        if let Some(var_args) = self.core.var_args() {
            command = command.arg(
                Arg::new(var_args.to_string())
                    .num_args(0..)
                    .action(ArgAction::Append)
                    .trailing_var_arg(true),
            );
        }
        command
    }

    fn gather(&self, matches: &ArgMatches) -> Map<String, Value> {
        let mut params = Map::new();
        for (name, role) in self.core.roles() {
            if matches!(role, ParameterRole::Directive(_)) {
                continue;
            }
            match self.behaviour(name, role) {
                CliBehaviour::Flag if !self.core.required().contains(name) => {
                    if matches.get_flag(name) {
                        params.insert(name.clone(), Value::Bool(true));
                    }
                }
                CliBehaviour::Append => {
                    if let Some(values) = matches.get_many::<String>(name) {
                        params.insert(name.clone(), values.cloned().map(Value::String).collect());
                    }
                }
                _ => {
                    if let Some(value) = matches.get_one::<String>(name) {
                        params.insert(name.clone(), Value::String(value.clone()));
                    }
                }
            }
        }
        if let Some(var_args) = self.core.var_args() {
            let values: Vec<Value> = matches
                .get_many::<String>(var_args)
                .map(|values| values.cloned().map(Value::String).collect())
                .unwrap_or_default();
            params.insert(var_args.to_string(), Value::Array(values));
        }
        params
    }

    /// Run the command with `args` (not including the program or command
    /// name), writing its formatted result to `out`.
    ///
    /// # Errors
    ///
    /// Argument and validation failures return [`Error::Cli`] carrying a
    /// non-zero exit code; unhandled application errors return
    /// [`Error::Unhandled`].
    pub fn run(&self, api: &Api, args: &[String], out: &mut dyn Write) -> Result<Value, Error> {
        api.start();
        let matches = match self.command().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(err)
                if matches!(err.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) =>
            {
                write!(out, "{}", err.render())?;
                return Ok(Value::Null);
            }
            Err(err) => {
                return Err(Error::Cli {
                    message: err.render().to_string(),
                    code: err.exit_code(),
                })
            }
        };
        let params = self.gather(&matches);
        debug!(command = %self.name, params = %Value::Object(params.clone()), "running command");

        let mut context = api.create_context(InterfaceKind::Cli, self.core.name(), None);
        let mut directives = DirectiveValues::default();
        let result = self.execute(api, params, &mut context, &mut directives);
        match result {
            Ok(Finished::Completed(value)) => {
                directives.cleanup(None);
                api.delete_context(context, &Outcome::Completed);
                self.write_output(api, &value, out)?;
                Ok(value)
            }
            Ok(Finished::Lacking(denied)) => {
                directives.cleanup(None);
                api.delete_context(context, &Outcome::Lacking(&denied));
                self.write_output(api, &denied, out)?;
                Ok(denied)
            }
            Ok(Finished::Invalid(errors)) => {
                directives.cleanup(None);
                api.delete_context(context, &Outcome::Invalid(&errors));
                let body = json!({ "errors": errors });
                writeln!(out, "{body}")?;
                Err(Error::Cli {
                    message: body.to_string(),
                    code: INVALID_EXIT_CODE,
                })
            }
            Err(Failure::Api(err)) => {
                directives.cleanup(Some(&err));
                api.delete_context(context, &Outcome::Failed(&err));
                Err(Error::Unhandled(err))
            }
            Err(Failure::Fatal(fatal)) => {
                let err = fatal
                    .api_error()
                    .cloned()
                    .unwrap_or_else(|| ApiError::application(fatal.to_string()));
                directives.cleanup(Some(&err));
                api.delete_context(context, &Outcome::Failed(&err));
                Err(fatal)
            }
        }
    }

    fn execute(
        &self,
        api: &Api,
        mut params: Map<String, Value>,
        context: &mut Context,
        directives: &mut DirectiveValues,
    ) -> Result<Finished, Failure> {
        let denied = self.core.check_requirements(&mut RequirementContext {
            request: None,
            response: None,
            context: &*context,
            api_version: None,
        })?;
        if let Some(denied) = denied {
            return Ok(Finished::Lacking(denied));
        }

        let scope = Scope {
            api,
            request: None,
            response: None,
            api_version: None,
            context: &*context,
        };
        self.core
            .resolve_directives(&scope, &params, false, directives)?;
        self.core.inject(directives, &mut params, false);

        let errors = self.core.validate(&mut params, context)?;
        if !errors.is_empty() {
            return Ok(Finished::Invalid(errors));
        }

        self.core.prepare(&mut params);
        let content = {
            let mut call = Call {
                params,
                directives: &*directives,
                api,
                api_version: None,
                request: None,
                response: None,
                context: &mut *context,
                exception: None,
            };
            self.core.invoke(&mut call)?
        };
        let value = match content {
            Content::Data(value) => value,
            Content::Stream(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text)?;
                Value::String(text)
            }
            Content::Forward(_) | Content::ForwardNamed(_) => {
                return Err(Failure::Api(ApiError::application(
                    "Forwarding is only supported over HTTP",
                )))
            }
        };
        let ctx = TransformContext {
            request: None,
            context: &*context,
        };
        Ok(Finished::Completed(self.core.apply_transform(value, &ctx)?))
    }

    /// Through the route or CLI output format when one is set, else as text.
    fn write_output(&self, api: &Api, value: &Value, out: &mut dyn Write) -> Result<(), Error> {
        let format = self.output.clone().or_else(|| api.cli.output_format());
        match format {
            Some(format) => {
                let rendered = format
                    .format(Payload::Data(value.clone()), None)
                    .map_err(Error::Unhandled)?;
                match rendered.body {
                    Body::Bytes(bytes) => out.write_all(&bytes)?,
                    Body::Stream { mut reader, .. } => {
                        std::io::copy(&mut reader, out)?;
                    }
                    Body::Empty => {}
                }
                writeln!(out)?;
            }
            None if value.is_null() => {}
            None => writeln!(out, "{}", display(value))?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for CliInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliInterface")
            .field("name", &self.name)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

/// The command-line half of an API.
#[derive(Default)]
pub struct CliApi {
    commands: Vec<(String, Arc<CliInterface>)>,
    output_format: Option<OutputFormatRef>,
}

impl CliApi {
    /// Register a command, replacing one of the same name.
    pub fn add_command(&mut self, interface: Arc<CliInterface>) {
        let name = interface.name().to_string();
        match self.commands.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = interface,
            None => self.commands.push((name, interface)),
        }
    }

    #[must_use]
    pub fn command(&self, name: &str) -> Option<&Arc<CliInterface>> {
        self.commands
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, interface)| interface)
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|(name, _)| name.as_str())
    }

    pub fn set_output_format(&mut self, format: OutputFormatRef) {
        self.output_format = Some(format);
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormatRef> {
        self.output_format.clone()
    }

    /// Dispatch `argv` (without the program name) to the command named by its
    /// first element. An API with a single command runs it directly.
    ///
    /// # Errors
    ///
    /// See [`CliInterface::run`]; an unknown command returns the usage text
    /// as an [`Error::Cli`].
    pub fn run(&self, api: &Api, argv: &[String], out: &mut dyn Write) -> Result<Value, Error> {
        if let Some((first, rest)) = argv.split_first() {
            if let Some(interface) = self.command(first) {
                return interface.run(api, rest, out);
            }
        }
        match self.commands.as_slice() {
            [(_, only)] => only.run(api, argv, out),
            _ => Err(Error::Cli {
                message: self.usage(api),
                code: INVALID_EXIT_CODE,
            }),
        }
    }

    fn usage(&self, api: &Api) -> String {
        let mut usage = format!("{}\n\nAvailable Commands:\n", api.name());
        for (name, interface) in &self.commands {
            usage.push_str(&format!("\n    - {name}"));
            if let Some(doc) = interface.core().documentation_text() {
                usage.push_str(&format!(": {doc}"));
            }
        }
        usage.push('\n');
        usage
    }

    /// Copy commands `other` defines and this API does not.
    pub(crate) fn merge(&mut self, other: &CliApi) {
        for (name, interface) in &other.commands {
            if self.command(name).is_none() {
                self.commands.push((name.clone(), Arc::clone(interface)));
            }
        }
        if self.output_format.is_none() {
            self.output_format = other.output_format.clone();
        }
    }
}

impl std::fmt::Debug for CliApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.commands()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::Signature;
    use crate::types;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| (*item).to_string()).collect()
    }

    fn greet() -> Endpoint {
        Endpoint::new(
            Signature::new("greet")
                .param("name")
                .optional("shout", json!(false))
                .optional_with("times", json!(1), types::number())
                .doc("Greets someone"),
            |call: &mut Call<'_>| -> Result<String, ApiError> {
                let name: String = call.arg("name")?;
                let shout: bool = call.arg("shout")?;
                let times: usize = call.arg("times")?;
                let greeting = format!("hello {name}").repeat(times);
                Ok(if shout { greeting.to_uppercase() } else { greeting })
            },
        )
    }

    #[test]
    fn test_positional_options_and_flags() {
        let api = Api::new("cli");
        let interface = CliInterface::new(&api, &greet(), &RouteSpec::default());
        let mut out = Vec::new();
        let value = interface
            .run(&api, &args(&["ada", "--shout", "-t", "2"]), &mut out)
            .unwrap();
        assert_eq!(value, json!("HELLO ADAHELLO ADA"));
        assert_eq!(String::from_utf8(out).unwrap(), "HELLO ADAHELLO ADA\n");
    }

    #[test]
    fn test_missing_positional_is_a_cli_error() {
        let api = Api::new("cli");
        let interface = CliInterface::new(&api, &greet(), &RouteSpec::default());
        let err = interface.run(&api, &[], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Cli { code, .. } if code != 0));
    }

    #[test]
    fn test_validation_errors_exit_non_zero() {
        let api = Api::new("cli");
        let interface = CliInterface::new(&api, &greet(), &RouteSpec::default());
        let mut out = Vec::new();
        let err = interface
            .run(&api, &args(&["ada", "--times", "lots"]), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::Cli { code: INVALID_EXIT_CODE, .. }));
        let printed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed, json!({"errors": {"times": "Invalid whole number provided"}}));
    }

    #[test]
    fn test_version_flag() {
        let api = Api::new("cli");
        let spec = RouteSpec {
            version: Some("1.0.0".to_string()),
            ..RouteSpec::default()
        };
        let interface = CliInterface::new(&api, &greet(), &spec);
        let mut out = Vec::new();
        let value = interface.run(&api, &args(&["-v"]), &mut out).unwrap();
        assert_eq!(value, Value::Null);
        assert!(String::from_utf8(out).unwrap().contains("1.0.0"));
    }
}
