mod cli;
mod commands;

use anyhow::{anyhow, Result};
use cli::ConsoleArgs;
use commands::{Console, ConsoleCommand, Outcome};
use kestrel_npc::local_scene::LocalScene;
use kestrel_npc::{NpcConfig, NpcModule, NpcModuleConfig, NpcRegistry, NULL_OWNER};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::Level;

const DEFAULT_REGION: &str = "Console Region";

fn main() {
    let args = match ConsoleArgs::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    if let Err(err) = run(args) {
        tracing::error!("Console error: {err:?}");
        std::process::exit(1);
    }
}

fn run(args: ConsoleArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => NpcModuleConfig::load(path)?,
        None => NpcModuleConfig { npc: NpcConfig::enabled(), ..NpcModuleConfig::default() },
    };
    let region = args.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string());
    let scene = Arc::new(LocalScene::new(region.clone()));
    let module = NpcModule::initialise(config.npc.clone(), Arc::new(NpcRegistry::new()), scene.clone())
        .ok_or_else(|| anyhow!("NPC support is disabled in the loaded config"))?;
    let module = Arc::new(module);
    tracing::info!(
        "[console] {} ready in {region} (lock strategy: {})",
        module.name(),
        module.config().lock_strategy.label()
    );

    let operator = args.owner.unwrap_or(NULL_OWNER);
    let console = Console::new(module, scene, operator, config.scripting.clone());

    if let Some(script) = args.script.clone() {
        if let Outcome::Continue(Some(text)) = console.execute(ConsoleCommand::Script(script))? {
            println!("{text}");
        }
    }

    repl(&console)
}

fn repl(console: &Console) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "npc> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match console.execute_line(&line) {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue(Some(text))) => writeln!(stdout, "{text}")?,
            Ok(Outcome::Continue(None)) => {}
            Err(err) => writeln!(stdout, "error: {err:#}")?,
        }
        write!(stdout, "npc> ")?;
        stdout.flush()?;
    }
    Ok(())
}
