use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use formdoc_config::Config;
use formdoc_engine::{
    ConfNode, DataId, FieldAccess, FormField, StateOptions, StoreMode, TextDocumentState,
    create_container, urls_for_id,
};
use std::fs;
use std::path::{Path, PathBuf};

mod doc_file;

#[derive(Parser, Debug)]
#[command(name = "formdoc")]
#[command(about = "Inspect and fill form documents", long_about = None)]
struct Args {
    /// Config file (default: ~/.config/formdoc/config.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Persistent data mode, overrides the config file
    #[arg(long = "store-mode", value_name = "MODE")]
    store_mode: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the form fields of a document
    Fields { document: PathBuf },
    /// Print the stored form values
    Values { document: PathBuf },
    /// Store a form value and update its fields
    SetValue {
        document: PathBuf,
        id: String,
        value: String,
    },
    /// Read or write raw persistent data
    Data {
        #[command(subcommand)]
        action: DataAction,
    },
    /// Record the current versions in the document
    Touch { document: PathBuf },
    /// Strip the form commands and form data from a document
    Deform { document: PathBuf },
    /// List the URLs of a text fragment
    Frag {
        frag_id: String,
        /// Fragment definitions (default: fragment_config from the config)
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum DataAction {
    /// Print the value stored under an id
    Get { document: PathBuf, id: String },
    /// Store a value under an id
    Set {
        document: PathBuf,
        id: String,
        value: String,
    },
    /// Delete everything stored under an id
    Remove { document: PathBuf, id: String },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    log::debug!("Config path: {}", config_path.display());
    let mut config = Config::load_from_path(&config_path)?.unwrap_or_default();
    if let Some(mode) = args.store_mode {
        config.store_mode = mode;
    }
    let options = StateOptions {
        store_mode: StoreMode::from_config(&config.store_mode),
        version_stamp: config.version_stamp.clone(),
        host_version: config.host_version.clone(),
    };

    match args.command {
        Commands::Fields { document } => print_fields(&document, options),
        Commands::Values { document } => {
            let state = TextDocumentState::new(doc_file::load(&document)?, options);
            for (id, value) in state.form_field_values() {
                println!("{id}\t{value}");
            }
            Ok(())
        }
        Commands::SetValue {
            document,
            id,
            value,
        } => with_state(&document, options, |state| {
            state.set_form_field_value(&id, Some(&value))?;
            state.update_form_fields(&id)?;
            Ok(())
        }),
        Commands::Data { action } => data(action, options.store_mode),
        Commands::Touch { document } => with_state(&document, options, |state| {
            let (version, host_version) = state.last_touched_versions();
            println!("last touched by {version} on {host_version}");
            state.update_last_touched_by_version_info()?;
            Ok(())
        }),
        Commands::Deform { document } => with_state(&document, options, |state| {
            state.de_form()?;
            Ok(())
        }),
        Commands::Frag { frag_id, file } => {
            let path = file
                .or(config.fragment_config)
                .ok_or_else(|| anyhow!("no fragment definitions given and none configured"))?;
            let conf = ConfNode::parse(&path.to_string_lossy(), &fs::read_to_string(&path)?)?;
            for url in urls_for_id(&conf, &frag_id)? {
                println!("{url}");
            }
            Ok(())
        }
    }
}

/// Runs `f` on the state of the document at `path` and writes the result
/// back.
fn with_state(
    path: &Path,
    options: StateOptions,
    f: impl FnOnce(&mut TextDocumentState) -> Result<()>,
) -> Result<()> {
    let mut state = TextDocumentState::new(doc_file::load(path)?, options);
    f(&mut state)?;
    state.flush_persistent_data()?;
    doc_file::save(path, &state.into_document())
}

fn print_fields(path: &Path, options: StateOptions) -> Result<()> {
    let state = TextDocumentState::new(doc_file::load(path)?, options);
    let doc = state.document();
    let describe = |field: &FormField| {
        let trafo = field
            .trafo_name(doc)
            .map(|t| format!(" TRAFO {t}"))
            .unwrap_or_default();
        format!("{:?} {:?}{trafo}", field.field_type(), field.value(doc))
    };

    for (id, fields) in state.id_to_form_fields() {
        for field in fields {
            println!("{id}\t{}", describe(field));
        }
    }
    for (id, fields) in state.id_to_text_field_form_fields() {
        for field in fields {
            println!("{id}\t(text field) {}", describe(field));
        }
    }
    for field in state.static_text_field_form_fields() {
        println!("-\t(static) {}", describe(field));
    }
    Ok(())
}

fn data(action: DataAction, mode: StoreMode) -> Result<()> {
    let (path, id) = match &action {
        DataAction::Get { document, id }
        | DataAction::Set { document, id, .. }
        | DataAction::Remove { document, id } => (document.as_path(), id.as_str()),
    };
    let Some(data_id) = DataId::parse(id) else {
        bail!("unknown data id '{id}'");
    };

    let mut doc = doc_file::load(path)?;
    let mut store = create_container(mode, &doc);
    match &action {
        DataAction::Get { .. } => {
            if let Some(value) = store.get(&doc, data_id) {
                println!("{value}");
            }
            return Ok(());
        }
        DataAction::Set { value, .. } => store.set(&mut doc, data_id, value)?,
        DataAction::Remove { .. } => store.remove(&mut doc, data_id)?,
    }
    store.flush(&mut doc)?;
    doc_file::save(path, &doc)
}
