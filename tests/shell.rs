use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncWriteExt, BufReader};
use serial_shell::{
    commands,
    connection::ConnectionState,
    response::CommandResponse,
    shell::{Shell, ShellExit, ShellOptions},
    transport::mock::{MockBuilder, MockConnector},
};

mod common;

fn shell_with(template: MockBuilder, json: bool) -> Result<Shell> {
    let registry = commands::registry(Arc::new(MockConnector::new(template)), common::BAUD)?;

    Ok(Shell::new(
        registry,
        ShellOptions {
            prompt: String::new(),
            json,
            response_timeout: Duration::from_millis(500),
        },
    ))
}

async fn run(shell: &Shell, input: &str) -> Result<(ShellExit, String)> {
    let mut output = vec![];
    let exit = shell.run(input.as_bytes(), &mut output).await?;

    Ok((exit, String::from_utf8(output)?))
}

#[tokio::test]
async fn session() -> Result<()> {
    let shell = shell_with(MockBuilder::new().no_loopback(), false)?;

    let (exit, output) = run(
        &shell,
        "help set\nset COM1\nopen\nwrite hello there\nclose\nquit\nopen\n",
    )
    .await?;

    assert_eq!(exit, ShellExit::Quit);
    assert_eq!(
        output,
        "  set <device: string>\n  COM1\n  COM1\n  hello there\n  COM1\n"
    );
    assert_eq!(shell.connection().state(), ConnectionState::Unconfigured);

    Ok(())
}

#[tokio::test]
async fn json_session() -> Result<()> {
    let shell = shell_with(MockBuilder::new().no_loopback(), true)?;

    let (exit, output) = run(&shell, "bogus\nset COM1\nclose\n").await?;
    assert_eq!(exit, ShellExit::EndOfInput);

    let responses = output
        .lines()
        .map(serde_json::from_str::<CommandResponse>)
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(
        responses,
        vec![
            CommandResponse::no_command(),
            CommandResponse::ok("set", &["COM1"]),
            CommandResponse::precondition("close", "Error: Already Closed"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn loopback_is_printed_as_read() -> Result<()> {
    let shell = shell_with(MockBuilder::new(), false)?.with_startup(["set COM1", "open"]);

    // Input stays open for a while, so inbound data has time to show up.
    let (mut input, reader) = tokio::io::duplex(1024);
    let feed = async move {
        input.write_all(b"write ping\n").await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(input);

        Ok::<_, std::io::Error>(())
    };

    let mut output = vec![];
    let (exit, fed) = tokio::join!(shell.run(BufReader::new(reader), &mut output), feed);
    fed?;
    assert_eq!(exit?, ShellExit::EndOfInput);

    let output = String::from_utf8(output)?;
    assert!(output.contains("  ping\n"), "{output}");
    assert!(output.contains("] read: ping\n"), "{output}");

    Ok(())
}

#[tokio::test]
async fn failed_open_is_reported() -> Result<()> {
    let shell = shell_with(MockBuilder::new().fail_open("Busy"), false)?;

    let (_, output) = run(&shell, "set COM1\nopen\n").await?;

    assert_eq!(output, "  COM1\n  Busy\n");
    assert_eq!(shell.connection().state(), ConnectionState::Configured);

    Ok(())
}

#[tokio::test]
async fn subscriptions_end_with_the_session() -> Result<()> {
    let shell = shell_with(MockBuilder::new(), false)?;

    run(&shell, "").await?;

    assert_eq!(shell.registry().hooks().listeners("read"), 0);
    assert_eq!(shell.registry().hooks().listeners("error"), 0);

    Ok(())
}
