// pulsar: command line front end for diagram documents and the diagrams API

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;

use pulsar::api::server;
use pulsar::api::service::DiagramService;
use pulsar::graph_utils::services::service_name;
use pulsar::persistence::document::validate_graph;
use pulsar::persistence::persist::{self, LocalStore};
use pulsar::persistence::settings::AppSettings;

fn cli() -> Command {
    Command::new("pulsar")
        .about("Pulsar: validate, import and export 3D architecture diagrams, or serve the diagrams API")
        .subcommand_required(true)
        .arg(
            Arg::new("autosave_dir")
                .long("autosave-dir")
                .value_name("DIR")
                .global(true)
                .help("Use DIR for local storage instead of the configured autosave directory"),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a diagram file and list every problem found")
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(
            Command::new("import")
                .about("Validate a diagram file and make it the autosaved diagram")
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(
            Command::new("export")
                .about("Write the autosaved diagram to a named export file")
                .arg(Arg::new("out").long("out").value_name("DIR").help("Output directory (default: configured export dir)")),
        )
        .subcommand(
            Command::new("show")
                .about("Summarize the autosaved diagram")
                .arg(Arg::new("edges").long("edges").action(ArgAction::SetTrue).help("Also list edges")),
        )
        .subcommand(Command::new("versions").about("List timestamped backups, newest first"))
        .subcommand(
            Command::new("serve")
                .about("Run the diagrams API in the foreground")
                .arg(Arg::new("host").long("host").value_name("ADDR").help("Bind address (default from settings)"))
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16))
                        .help("Port (default from settings)"),
                ),
        )
}

fn load_settings() -> AppSettings {
    match AppSettings::load() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("using default settings: {}", e);
            AppSettings::default()
        }
    }
}

// `--autosave-dir` may come before or after the subcommand
fn storage(settings: &AppSettings, matches: &ArgMatches, sub: &ArgMatches) -> LocalStore {
    match sub.get_one::<String>("autosave_dir").or_else(|| matches.get_one::<String>("autosave_dir")) {
        Some(dir) => LocalStore::new(dir),
        None => LocalStore::from_settings(settings),
    }
}

fn cmd_validate(file: &str) -> anyhow::Result<bool> {
    let text = std::fs::read_to_string(file)?;
    let value: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            println!("{}: Invalid JSON: {}", file, e);
            return Ok(false);
        }
    };
    let report = validate_graph(&value);
    if report.valid {
        println!("{}: valid", file);
    } else {
        println!("{}: {} problem(s)", file, report.errors.len());
        for err in &report.errors {
            println!("  - {}", err);
        }
    }
    Ok(report.valid)
}

fn cmd_import(store: &LocalStore, file: &str) -> anyhow::Result<()> {
    let doc = persist::load_from_path(&PathBuf::from(file))?;
    let path = store.save_document(&doc)?;
    println!("imported \"{}\" ({} nodes, {} edges) -> {}", doc.name, doc.nodes.len(), doc.edges.len(), path.display());
    Ok(())
}

fn cmd_export(settings: &AppSettings, store: &LocalStore, out: Option<&String>) -> anyhow::Result<()> {
    let Some(doc) = store.load_document() else {
        anyhow::bail!("no autosaved diagram in {}", store.dir().display());
    };
    let dir = out.map(PathBuf::from).unwrap_or_else(|| settings.export_dir());
    let path = persist::export_to_dir(&doc, &dir)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_show(store: &LocalStore, with_edges: bool) {
    let graph = store.load_or_default();
    println!("{} [{}]", graph.name, graph.id);
    println!("{} nodes, {} edges", graph.node_count(), graph.edge_count());
    for node in &graph.nodes {
        let [x, y, z] = node.position;
        println!("  {:<24} {:<20} ({:.1}, {:.1}, {:.1})", node.label, service_name(&node.kind), x, y, z);
    }
    if with_edges {
        for edge in graph.renderable_edges() {
            let label = edge.label.as_deref().unwrap_or("");
            println!("  {} -> {} {:?} {}", edge.source, edge.target, edge.style, label);
        }
    }
}

fn cmd_versions(store: &LocalStore) -> anyhow::Result<()> {
    let versions = store.list_versions()?;
    if versions.is_empty() {
        println!("no backups in {}", store.dir().display());
    }
    for v in versions {
        println!("{}", v.display());
    }
    Ok(())
}

fn cmd_serve(mut settings: AppSettings, matches: &ArgMatches) -> anyhow::Result<()> {
    if let Some(host) = matches.get_one::<String>("host") {
        settings.api_bind_addr = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        settings.api_port = *port;
    }
    server::serve(&settings, Arc::new(DiagramService::new()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let matches = cli().get_matches();
    let settings = load_settings();
    let Some((name, sub)) = matches.subcommand() else {
        anyhow::bail!("no command given; see `pulsar --help`");
    };
    let store = storage(&settings, &matches, sub);

    match (name, sub) {
        ("validate", sub) => {
            let file = sub.get_one::<String>("file").map(String::as_str).unwrap_or_default();
            if !cmd_validate(file)? {
                std::process::exit(1);
            }
        }
        ("import", sub) => {
            let file = sub.get_one::<String>("file").map(String::as_str).unwrap_or_default();
            cmd_import(&store, file)?;
        }
        ("export", sub) => cmd_export(&settings, &store, sub.get_one::<String>("out"))?,
        ("show", sub) => cmd_show(&store, sub.get_flag("edges")),
        ("versions", _) => cmd_versions(&store)?,
        ("serve", sub) => cmd_serve(settings, sub)?,
        (other, _) => anyhow::bail!("unknown command {}", other),
    }
    Ok(())
}
