//! Unit tests for the xref index and pipeline.

#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use crate::{
    command::{Command, CommandId, CommandTree, Flag, FlagId, FlagValue, Titles, TreeBuilder},
    xref::{HookPipeline, Namespace, Xref, XrefError, XrefIndex},
};

fn shell_tree() -> (CommandTree, CommandId, FlagId) {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let shell = b.new_sub_cmd().titles("sh", "shell").id();
    let verbose = b
        .root()
        .new_flag(FlagValue::Bool(false))
        .titles("v", "verbose")
        .id();
    (b.build(), shell, verbose)
}

fn named(full: &str, short: &str) -> Command {
    Command {
        titles: Titles {
            short: (!short.is_empty()).then(|| short.to_string()),
            full: full.to_string(),
            aliases: Vec::new(),
        },
        ..Command::default()
    }
}

#[test]
fn short_and_long_alias_resolve_to_same_node_and_duplicates_fail_closed() {
    let (tree, shell, verbose) = shell_tree();
    let mut xref = Xref::new(tree, HookPipeline::new());

    let index = match xref.rebuild(&[]) {
        Ok(index) => index,
        Err(e) => panic!("first build failed: {e}"),
    };
    assert_eq!(index.command(CommandTree::ROOT, "sh"), Some(shell));
    assert_eq!(index.command(CommandTree::ROOT, "shell"), Some(shell));
    assert_eq!(index.flag(CommandTree::ROOT, "v"), Some(verbose));
    assert_eq!(index.flag(CommandTree::ROOT, "verbose"), Some(verbose));

    let tree = xref.tree_mut();
    let clash = tree.add_command(named("shadow", "sh"));
    assert!(tree.attach_command(CommandTree::ROOT, clash));

    match xref.rebuild(&[]) {
        Err(XrefError::DuplicateAlias {
            namespace,
            alias,
            first,
            second,
            ..
        }) => {
            assert_eq!(namespace, Namespace::Command);
            assert_eq!(alias, "sh");
            assert_eq!(first, "shell");
            assert_eq!(second, "shadow");
        }
        other => panic!("expected duplicate alias, got {other:?}"),
    }

    let kept = xref.index();
    assert_eq!(kept.and_then(|i| i.command(CommandTree::ROOT, "sh")), Some(shell));
    assert!(xref.is_stale());
}

#[test]
fn same_alias_under_different_parents_is_allowed() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let root = b.cursor();
    let server = b.new_sub_cmd().titles("s", "server").id();
    let server_start = b.new_sub_cmd().titles("", "start").id();
    b.new_cmd_from(root);
    b.new_sub_cmd().titles("c", "client");
    let client_start = b.new_sub_cmd().titles("", "start").id();

    let index = XrefIndex::build(&b.build()).unwrap_or_default();
    assert_eq!(index.resolve(["s", "start"]), Some(server_start));
    assert_eq!(index.resolve(["client", "start"]), Some(client_start));
    assert_eq!(index.resolve(["server"]), Some(server));
    assert_eq!(index.resolve(Vec::<&str>::new()), Some(CommandTree::ROOT));
    assert_eq!(index.resolve(["nope"]), None);
}

#[test]
fn flags_fall_back_to_ancestors_and_clash_per_owner() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let debug = b
        .root()
        .new_flag(FlagValue::Bool(false))
        .titles("D", "debug")
        .id();
    let server = b.new_sub_cmd().titles("", "server").id();
    let start = b.new_sub_cmd().titles("", "start").id();
    let local = b.new_int(1).titles("D", "depth").attach_to(start).id();

    let mut tree = b.build();
    let index = XrefIndex::build(&tree).unwrap_or_default();
    assert_eq!(index.flag(start, "debug"), Some(debug));
    assert_eq!(index.flag(start, "D"), Some(local));
    assert_eq!(index.flag(server, "D"), Some(debug));
    assert_eq!(index.flag(server, "depth"), None);

    let dup = tree.add_flag(Flag::new(FlagValue::Int(0)));
    if let Some(flag) = tree.flag_mut(dup) {
        flag.titles.full = "depth".to_string();
    }
    tree.attach_flag(start, dup);

    match XrefIndex::build(&tree) {
        Err(XrefError::DuplicateAlias { namespace, scope, .. }) => {
            assert_eq!(namespace, Namespace::Flag);
            assert_eq!(scope, "server.start");
        }
        other => panic!("expected flag clash, got {other:?}"),
    }
}

#[test]
fn command_and_flag_namespaces_are_separate() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    b.new_sub_cmd().titles("v", "version");
    let root = CommandTree::ROOT;
    b.root().new_flag(FlagValue::Bool(false)).titles("v", "verbose");

    let index = XrefIndex::build(&b.build());
    assert!(index.is_ok());
    assert!(index.map(|i| i.command(root, "v").is_some()).unwrap_or(false));
}

#[test]
fn untitled_nodes_fail_the_build() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    let server = b.new_sub_cmd().titles("s", "server").id();
    b.new_uint(8080).titles("p", "port").attach_to(server);
    let untitled = b.new_bool(true).titles("x", "").attach_to(server).id();
    let tree = b.build();

    assert_eq!(tree.flag_key(untitled), None);
    match XrefIndex::build(&tree) {
        Err(XrefError::MissingTitle {
            namespace,
            node,
            scope,
        }) => {
            assert_eq!(namespace, Namespace::Flag);
            assert_eq!(node, untitled.index());
            assert_eq!(scope, "server");
        }
        other => panic!("expected MissingTitle, got {other:?}"),
    }

    let mut b = TreeBuilder::new("demo", "0.1.0");
    b.new_sub_cmd();
    assert!(matches!(
        XrefIndex::build(&b.build()),
        Err(XrefError::MissingTitle {
            namespace: Namespace::Command,
            ..
        })
    ));
}

#[test]
fn detached_nodes_are_not_indexed() {
    let mut b = TreeBuilder::new("demo", "0.1.0");
    b.new_cmd().titles("x", "loose");
    b.new_bool(true).titles("y", "free");

    let index = XrefIndex::build(&b.build()).unwrap_or_default();
    assert_eq!(index.resolve(["loose"]), None);
    assert_eq!(index.command_alias_count(), 0);
    assert_eq!(index.flag_alias_count(), 0);
}

#[test]
fn before_hooks_can_add_commands_and_after_hooks_see_them() {
    let (tree, _, _) = shell_tree();
    let mut hooks = HookPipeline::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&order);
    hooks.on_before_xref_building(move |tree, args| {
        if let Ok(mut seen) = seen.lock() {
            seen.push(format!("before:{}", args.len()));
        }
        let already = tree
            .command(CommandTree::ROOT)
            .map(|root| root.children().len() > 1)
            .unwrap_or(true);
        if !already {
            let id = tree.add_command(named("plugin", ""));
            tree.attach_command(CommandTree::ROOT, id);
        }
    });

    let seen = Arc::clone(&order);
    hooks.on_after_xref_built(move |_, index, _| {
        if let Ok(mut seen) = seen.lock() {
            seen.push(format!("after:{}", index.resolve(["plugin"]).is_some()));
        }
    });

    let mut xref = Xref::new(tree, hooks);
    let args = vec!["demo".to_string(), "plugin".to_string()];
    assert!(xref.rebuild(&args).is_ok());
    assert!(!xref.is_stale());

    assert!(xref.rebuild(&args).is_ok());
    let count = xref
        .tree()
        .command(CommandTree::ROOT)
        .map(|root| root.children().len());
    assert_eq!(count, Some(2));

    let order = order.lock().map(|o| o.clone()).unwrap_or_default();
    assert_eq!(order, vec!["before:2", "after:true", "before:2", "after:true"]);
}

#[test]
fn index_goes_stale_after_tree_change() {
    let (tree, shell, _) = shell_tree();
    let mut xref = Xref::new(tree, HookPipeline::new());
    assert!(xref.is_stale());

    assert!(xref.rebuild(&[]).is_ok());
    assert!(xref.fresh_index().is_some());

    if let Some(command) = xref.tree_mut().command_mut(shell) {
        command.meta.description = "changed".to_string();
    }
    assert!(xref.fresh_index().is_none());
    assert!(xref.index().is_some());
}
