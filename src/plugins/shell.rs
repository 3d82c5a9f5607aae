use tracing::debug;

use crate::{
    app::AppBuilder,
    command::{Action, Command, CommandTree, Meta, Titles},
};

/// Full title of the injected command.
pub const SHELL_COMMAND: &str = "shell";

/// Short title of the injected command.
pub const SHELL_SHORT: &str = "sh";

/// Adds a `sh` / `shell` sub-command to the root on every xref build,
/// unless the root already has a child answering to `shell`.
///
/// The command's action does nothing; applications replace it or hang
/// their own sub-commands below it.
pub fn with_shell_module(builder: AppBuilder) -> AppBuilder {
    builder.with_before_xref_building(|tree, _| ensure_shell_command(tree))
}

fn ensure_shell_command(tree: &mut CommandTree) {
    let present = tree.command(CommandTree::ROOT).is_some_and(|root| {
        root.children()
            .iter()
            .filter_map(|id| tree.command(*id))
            .any(|child| child.titles.answers_to(SHELL_COMMAND))
    });
    if present {
        return;
    }

    let command = Command {
        titles: Titles {
            short: Some(SHELL_SHORT.to_string()),
            full: SHELL_COMMAND.to_string(),
            aliases: Vec::new(),
        },
        meta: Meta {
            description: "Run commands in an interactive shell".to_string(),
            group: "Misc".to_string(),
            ..Meta::default()
        },
        action: Some(Action::new(|_| Ok(String::new()))),
        ..Command::default()
    };

    let id = tree.add_command(command);
    tree.attach_command(CommandTree::ROOT, id);
    debug!("shell module attached");
}
