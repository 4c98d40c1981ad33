use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use color_eyre::Result;
use pretty_assertions::assert_eq;
use serial_shell::{
    command::{CommandBuilder, ParamSpec},
    error::Error,
    registry::CommandRegistry,
    response::CommandResponse,
};

mod common;

#[tokio::test]
async fn every_alias_resolves_to_the_same_command() -> Result<()> {
    let h = common::harness();

    for aliases in [
        &["help", "h"][..],
        &["quit", "q", "exit"],
        &["set"],
        &["open", "start"],
        &["close", "stop"],
        &["write", "w", "send"],
    ] {
        for alias in aliases {
            let command = h.registry.try_resolve(alias)?;
            assert_eq!(command.name(), aliases[0]);
        }
    }

    Ok(())
}

#[tokio::test]
async fn unknown_command_is_no_command() -> Result<()> {
    let h = common::harness();

    for line in ["frobnicate", "", " open", "OPEN", "help2"] {
        assert_eq!(h.send(line).await?, CommandResponse::no_command());
    }

    Ok(())
}

#[tokio::test]
async fn no_command_json_shape() -> Result<()> {
    let h = common::harness();

    let json = serde_json::to_string(&h.send("nope").await?)?;
    assert_eq!(json, r#"{"name":null,"status":1,"data":["Error: No Command"]}"#);

    Ok(())
}

#[tokio::test]
async fn primary_names_in_registration_order() {
    let h = common::harness();

    assert_eq!(
        h.registry.names(true).collect::<Vec<_>>(),
        vec!["help", "quit", "set", "close", "open", "write"]
    );
}

#[test]
fn duplicates_are_rejected() {
    let mut registry = CommandRegistry::<()>::new();
    registry
        .register(
            CommandBuilder::new("ping")
                .alias("p")
                .build(|i| i.responder.ok(&["pong"])),
        )
        .unwrap();

    let clash =
        registry.register(CommandBuilder::new("ping").build(|i| i.responder.ok(&["again"])));
    assert!(matches!(clash, Err(Error::DuplicatePrimaryName(name)) if name == "ping"));

    let clash = registry.register(
        CommandBuilder::new("pulse")
            .alias("p")
            .build(|i| i.responder.ok(&["p"])),
    );
    assert!(matches!(clash, Err(Error::DuplicateAlias { owner, .. }) if owner == "ping"));

    // Nothing from the rejected commands is left behind
    assert!(registry.resolve("pulse").is_none());
    assert_eq!(registry.names(false).collect::<Vec<_>>(), vec!["ping", "p"]);
}

#[tokio::test]
async fn handler_gets_arguments_after_the_name() -> Result<()> {
    let mut registry = CommandRegistry::<()>::new();
    registry.register(
        CommandBuilder::new("echo")
            .param(ParamSpec::required("words", "string..."))
            .build(|invocation| {
                let args = invocation.args.clone();
                invocation.responder.ok(&args)
            }),
    )?;

    let response = registry
        .dispatch("echo a  b", ())
        .await
        .into_response()
        .ok_or_else(|| color_eyre::eyre::eyre!("Wanted a response"))?;

    assert_eq!(response, CommandResponse::ok("echo", &["a", "", "b"]));

    Ok(())
}

#[tokio::test]
async fn handler_which_drops_responder_gives_no_response() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));

    let mut registry = CommandRegistry::<()>::new();
    let counted = Arc::clone(&calls);
    registry.register(CommandBuilder::new("silent").build(move |_invocation| {
        counted.fetch_add(1, Ordering::SeqCst);
    }))?;

    let response = registry
        .dispatch("silent", ())
        .await
        .into_response()
        .ok_or_else(|| color_eyre::eyre::eyre!("Wanted a response"))?;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        response,
        CommandResponse::error("silent", serial_shell::response::NO_RESPONSE)
    );

    Ok(())
}
