//! Unit tests for the command tree and builder.

#![allow(clippy::panic)]

use std::time::Duration;

use crate::command::{CommandTree, FlagValue, TreeBuilder};

fn titles_of(tree: &CommandTree, ids: &[crate::command::CommandId]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| tree.command(*id))
        .map(|c| c.titles.full.clone())
        .collect()
}

#[test]
fn attaching_same_child_twice_keeps_child_count() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let child = b.new_cmd().titles("s", "server").id();

    let root = b.cursor();
    b.new_cmd_from(child).attach_to(root);
    let after_first = b.tree().command(root).map(|c| c.children().len());

    b.new_cmd_from(child).attach_to(root);
    let after_second = b.tree().command(root).map(|c| c.children().len());

    assert_eq!(after_first, Some(1));
    assert_eq!(after_second, after_first);
}

#[test]
fn sub_cmd_advances_cursor_and_new_cmd_does_not() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let root = b.cursor();

    let server = b.new_sub_cmd().titles("", "server").id();
    assert_eq!(b.cursor(), server);

    let start = b.new_sub_cmd().titles("", "start").id();
    assert_eq!(b.cursor(), start);

    let detached = b.new_cmd().titles("", "loose").id();
    assert_eq!(b.cursor(), start);

    b.new_cmd_from(root);
    let status = b.new_sub_cmd().titles("", "status").id();

    let tree = b.build();
    assert_eq!(tree.dotted_path(start), "server.start");
    assert_eq!(tree.dotted_path(status), "status");
    assert_eq!(tree.command(detached).and_then(|c| c.parent()), None);
    assert!(!tree.is_attached(detached));
    assert_eq!(titles_of(&tree, &tree.walk()), vec!["demo", "server", "start", "status"]);
}

#[test]
fn attach_ignores_root_ancestors_and_foreign_parents() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let root = b.cursor();
    let a = b.new_sub_cmd().titles("", "a").id();
    let a1 = b.new_sub_cmd().titles("", "a1").id();
    b.new_cmd_from(root);
    let other = b.new_sub_cmd().titles("", "other").id();

    let mut tree = b.build();
    let generation = tree.generation();

    assert!(!tree.attach_command(a1, root));
    assert!(!tree.attach_command(a1, a));
    assert!(!tree.attach_command(a, a));
    assert!(!tree.attach_command(other, a1));
    assert_eq!(tree.generation(), generation);

    assert_eq!(tree.dotted_path(a1), "a.a1");
    assert_eq!(tree.command(other).map(|c| c.children().len()), Some(0));
}

#[test]
fn flag_moves_to_its_latest_owner() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let root = b.cursor();
    let a = b.new_sub_cmd().titles("", "a").id();
    b.new_cmd_from(root);
    let c = b.new_sub_cmd().titles("", "c").id();

    let flag = b.new_bool(false).titles("v", "verbose").attach_to(a).id();
    b.new_flag_from(flag);

    let tree = b.build();
    assert_eq!(tree.flag(flag).and_then(|f| f.owner()), Some(c));
    assert!(tree.command(a).map(|x| x.flags().is_empty()).unwrap_or(false));
    assert_eq!(tree.command(c).map(|x| x.flags().to_vec()), Some(vec![flag]));
    assert_eq!(tree.flag_key(flag).as_deref(), Some("c.verbose"));
}

#[test]
fn detached_flag_has_no_key() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let flag = b.new_string("x").titles("", "name").id();

    let tree = b.build();
    assert_eq!(tree.flag_key(flag), None);
    assert!(tree.attached_flags().is_empty());
}

#[test]
fn root_flags_key_at_top_level() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let debug = b.root().new_flag(FlagValue::Bool(false)).titles("D", "debug").id();

    let tree = b.build();
    assert_eq!(tree.flag_key(debug).as_deref(), Some("debug"));
}

#[test]
fn typed_constructors_set_default_and_type() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let timeout = b.new_duration(Duration::from_secs(5)).id();
    let tags = b.new_string_slice(&["a", "b"]).id();
    let ratio = b.new_float32(0.5).id();
    let level = b
        .new_string("info")
        .valid_args(&["info", "debug", "info"])
        .env_vars(&["DEMO_LEVEL"])
        .required(true)
        .id();

    let tree = b.build();
    assert_eq!(
        tree.flag(timeout).map(|f| f.default.clone()),
        Some(FlagValue::Duration(Duration::from_secs(5)))
    );
    assert_eq!(tree.flag(tags).map(|f| f.default.kind()), Some("string slice"));
    assert_eq!(tree.flag(ratio).map(|f| f.default.kind()), Some("float32"));

    let level = tree.flag(level).cloned();
    assert_eq!(level.as_ref().map(|f| f.valid_args.len()), Some(2));
    assert_eq!(level.as_ref().map(|f| f.env_vars.clone()), Some(vec!["DEMO_LEVEL".to_string()]));
    assert_eq!(level.map(|f| f.required), Some(true));
}

#[test]
fn metadata_chain_lands_on_the_command() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    b.header("Demo Tool").copyright("(c) 2026", "someone");
    let id = b
        .new_sub_cmd()
        .titles("l", "list")
        .aliases(&["ls", "ls"])
        .description("list things")
        .long_description("lists all the things")
        .examples("demo list")
        .group("Query")
        .hidden(true)
        .id();

    let tree = b.build();
    let command = tree.command(id).cloned().unwrap_or_default();
    assert_eq!(command.titles.names().collect::<Vec<_>>(), vec!["list", "l", "ls"]);
    assert_eq!(command.meta.group, "Query");
    assert!(command.meta.hidden);
    assert_eq!(tree.meta().header, "Demo Tool");
    assert_eq!(tree.meta().author, "someone");
    assert_eq!(tree.meta().app_name, "demo");
}

#[test]
fn any_mutation_advances_generation() {
    let mut tree = CommandTree::new("demo", "0.1.0");
    let g0 = tree.generation();

    let id = tree.add_command(Default::default());
    let g1 = tree.generation();
    assert!(g1 > g0);

    assert!(tree.attach_command(tree.root(), id));
    assert!(tree.generation() > g1);

    let g2 = tree.generation();
    if let Some(command) = tree.command_mut(id) {
        command.titles.full = "renamed".to_string();
    }
    assert!(tree.generation() > g2);
}
