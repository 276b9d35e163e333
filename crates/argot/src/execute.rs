//! Running a resolved command: parse, merge, validate, then hooks.

use std::io::{self, Write};

use argot_argparse::flag::{HELP_FLAG, VERSION_FLAG};
use argot_argparse::suggest::{MAX_SUGGESTIONS, score};
use argot_argparse::Matches;

use crate::command::HookSlot;
use crate::context::Context;
use crate::error::Error;
use crate::external::{self, Env};
use crate::resolve::{Resolution, WalkMode};
use crate::tree::{CommandId, CommandTree, VERSION_COMMAND};

fn emit(w: &mut dyn Write, text: &str) {
    if let Err(e) = w.write_all(text.as_bytes()) {
        tracing::debug!(error = %e, "failed to write output");
    }
}

impl CommandTree {
    /// Run against the process environment, stdout and stderr. `args`
    /// excludes the program name. Returns the exit code.
    pub fn run<I, S>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut out = io::stdout().lock();
        let mut err = io::stderr().lock();
        self.execute_with(&args, &Env::Process, &mut out, &mut err)
    }

    /// Run with explicit environment and output streams.
    pub fn execute_with<S: AsRef<str>>(
        &self,
        args: &[S],
        env: &Env,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> i32 {
        let root = self.root();
        match self.resolve(args, WalkMode::Execute) {
            Resolution::Help { path } => self.exec_help(root, &path, out, err),
            Resolution::Version => {
                self.print_version(root, out);
                0
            }
            Resolution::Command { id, args } => match self.dispatch(id, &args, env, out, err) {
                Ok(code) => code,
                Err(failure) => self.report(id, failure, err),
            },
        }
    }

    fn dispatch(
        &self,
        id: CommandId,
        args: &[String],
        env: &Env,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<i32, Failure> {
        let cmd = self.command(id);
        let mut matches =
            argot_argparse::parse(args, &self.effective_flags(id), &self.parser_options(id));
        if let Some(e) = matches.error() {
            return Err(Failure::usage(self.flag_error(id, e.clone().into())));
        }

        if matches.has_flag(HELP_FLAG) {
            emit(out, &self.help_text(id));
            return Ok(0);
        }

        let positionals = matches.positionals().to_vec();
        if self.is_root(id) {
            if let Some(first) = positionals.first() {
                if self.help_command_name(id).as_ref() == Some(first) {
                    return Ok(self.exec_help(id, &positionals[1..], out, err));
                }
                if first == VERSION_COMMAND && self.version(id).is_some() {
                    self.print_version(id, out);
                    return Ok(0);
                }
            }
        }

        if let Some(message) = &cmd.deprecated {
            emit(
                err,
                &format!("Command \"{}\" is deprecated: {message}\n", self.command_path(id)),
            );
        }
        for flag in matches.flags().iter() {
            if let Some(message) = flag.deprecation() {
                if matches.has_flag(flag.name()) {
                    emit(err, &format!("Flag \"{}\" is deprecated: {message}\n", flag.long()));
                }
            }
        }

        external::apply(self, id, &mut matches, env).map_err(Failure::usage)?;
        self.apply_bindings(id, &matches)
            .map_err(|e| Failure::usage(self.flag_error(id, e)))?;

        if matches.has_flag(VERSION_FLAG) {
            self.print_version(id, out);
            return Ok(0);
        }

        if let Some(validate) = &cmd.args {
            validate(positionals.as_slice()).map_err(|m| Failure::usage(Error::Args(m)))?;
        }
        self.check_required(id, &matches)
            .map_err(|e| Failure::usage(self.flag_error(id, e)))?;
        self.check_groups(id, &matches)
            .map_err(|e| Failure::usage(self.flag_error(id, e)))?;

        if !cmd.is_runnable() {
            let Some(first) = positionals.first() else {
                emit(out, &self.help_text(id));
                return Ok(0);
            };
            return Err(Failure::UnknownCommand(self.unknown_command(id, first)));
        }

        self.run_hooks(id, &matches, out, err)
            .map_err(Failure::usage)
    }

    fn flag_error(&self, id: CommandId, error: Error) -> Error {
        match self.flag_error_func(id) {
            Some(transform) => transform(error),
            None => error,
        }
    }

    fn apply_bindings(&self, id: CommandId, matches: &Matches) -> Result<(), Error> {
        for flag in self.effective_flags(id).iter() {
            let Some(value) = self.value_binding(id, flag.name()) else {
                continue;
            };
            if !matches.has_value(flag.name()) {
                continue;
            }
            for raw in matches.explicit_values(flag.name()) {
                value
                    .borrow_mut()
                    .set(&raw)
                    .map_err(|message| Error::Binding {
                        flag: flag.long(),
                        value: raw.clone(),
                        message,
                    })?;
            }
        }
        Ok(())
    }

    fn check_required(&self, id: CommandId, matches: &Matches) -> Result<(), Error> {
        match self
            .effective_flags(id)
            .iter()
            .find(|f| f.is_required() && !matches.has_value(f.name()))
        {
            Some(flag) => Err(Error::RequiredFlag { flag: flag.long() }),
            None => Ok(()),
        }
    }

    /// Groups declared anywhere from the root down to `id`.
    fn check_groups(&self, id: CommandId, matches: &Matches) -> Result<(), Error> {
        let lineage = self.lineage(id);
        let groups = lineage.iter().map(|&c| &self.command(c).groups);
        let set = |group: &[String]| group.iter().filter(|f| matches.has_value(f)).count();

        for group in groups.clone().flat_map(|g| &g.mutually_exclusive) {
            if set(group) >= 2 {
                return Err(Error::MutuallyExclusive { flags: group.clone() });
            }
        }
        for group in groups.clone().flat_map(|g| &g.one_required) {
            if set(group) == 0 {
                return Err(Error::OneRequired { flags: group.clone() });
            }
        }
        for group in groups.flat_map(|g| &g.required_together) {
            let n = set(group);
            if n != 0 && n != group.len() {
                return Err(Error::RequiredTogether { flags: group.clone() });
            }
        }
        Ok(())
    }

    /// Persistent pre-run hooks root first, pre-run, the action, post-run,
    /// then persistent post-run hooks leaf first.
    fn run_hooks(
        &self,
        id: CommandId,
        matches: &Matches,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<i32, Error> {
        let lineage = self.lineage(id);
        let cmd = self.command(id);
        let mut ctx = Context {
            tree: self,
            id,
            matches,
            out,
            err,
        };

        for &level in &lineage {
            run_slot(&self.command(level).hooks.persistent_pre, &mut ctx)?;
        }
        run_slot(&cmd.hooks.pre, &mut ctx)?;

        tracing::debug!(command = %self.command_path(id), "running action");
        let code = if let Some(action) = &cmd.try_action {
            action(&mut ctx).map_err(Error::Hook)?;
            0
        } else if let Some(action) = &cmd.action {
            action(&mut ctx)
        } else {
            0
        };

        run_slot(&cmd.hooks.post, &mut ctx)?;
        for &level in lineage.iter().rev() {
            run_slot(&self.command(level).hooks.persistent_post, &mut ctx)?;
        }
        Ok(code)
    }

    fn exec_help(&self, base: CommandId, path: &[String], out: &mut dyn Write, err: &mut dyn Write) -> i32 {
        let mut target = base;
        for name in path {
            match self.find_child(target, name) {
                Some(child) => target = child,
                None => {
                    let error = self.unknown_command(target, name);
                    return self.report(target, Failure::UnknownCommand(error), err);
                }
            }
        }
        emit(out, &self.help_text(target));
        0
    }

    fn print_version(&self, id: CommandId, out: &mut dyn Write) {
        if let Some(text) = self.version_text(id) {
            emit(out, &format!("{text}\n"));
        }
    }

    fn unknown_command(&self, id: CommandId, token: &str) -> Error {
        let suggestions = if self.suggestions(id) {
            self.suggest_commands(id, token)
        } else {
            Vec::new()
        };
        Error::UnknownCommand {
            command: token.to_string(),
            path: self.command_path(id),
            suggestions,
        }
    }

    /// Visible children closest to `token`, scored by their best name or alias.
    fn suggest_commands(&self, id: CommandId, token: &str) -> Vec<String> {
        let max = self.suggestions_minimum_distance(id);
        let mut scored: Vec<(usize, String)> = self
            .visible_children(id)
            .into_iter()
            .map(|c| {
                let cmd = self.command(c);
                let best = std::iter::once(&cmd.name)
                    .chain(&cmd.aliases)
                    .map(|n| score(token, n))
                    .min()
                    .unwrap_or(usize::MAX);
                (best, cmd.name.clone())
            })
            .filter(|(s, _)| *s <= max)
            .collect();
        scored.sort();
        scored
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(_, name)| name)
            .collect()
    }

    fn report(&self, id: CommandId, failure: Failure, err: &mut dyn Write) -> i32 {
        tracing::debug!(command = %self.command_path(id), "command failed");
        let silence_errors = self.silence_errors(id);
        match failure {
            Failure::UnknownCommand(error) => {
                if !silence_errors {
                    emit(err, &format!("Error: {error}\n"));
                    emit(err, &format!("Run '{} --help' for usage.\n", self.command_path(id)));
                }
            }
            Failure::Usage(error) => {
                let message = error.to_string();
                if !silence_errors && !message.is_empty() {
                    emit(err, &format!("Error: {message}"));
                    if !message.ends_with('\n') {
                        emit(err, "\n");
                    }
                }
                if !self.silence_usage(id) {
                    emit(err, "\n");
                    emit(err, &self.usage_line(id));
                }
            }
        }
        1
    }
}

fn run_slot(slot: &HookSlot, ctx: &mut Context<'_>) -> Result<(), Error> {
    if let Some(hook) = &slot.fallible {
        hook(ctx).map_err(Error::Hook)?;
    }
    if let Some(hook) = &slot.plain {
        hook(ctx);
    }
    Ok(())
}

/// How a failed invocation is reported.
enum Failure {
    /// Error line followed by the usage synopsis.
    Usage(Error),
    /// Error line followed by a pointer to `--help`.
    UnknownCommand(Error),
}

impl Failure {
    fn usage(error: Error) -> Self {
        Self::Usage(error)
    }
}
