use clap::{Parser, Subcommand};
use easel_core::{
    capabilities, ContextMenuCapability, DeleteHotkeyCapability, DocumentCapability, Editor,
    EditorError, EditorOptions, HistoryCapability, Hotkey, KeyEvent, MemoryScene,
    MoveHotkeyCapability, Scene, SceneObject, WorkspaceCapability,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "easel-cli", version = "0.1.0")]
struct Cli {
    /// Optional TOML profile configuring workspace size and history depth
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import a JSON document through the hook chains, then export it back
    Import {
        /// Path to the document to import
        #[arg(long)]
        file: PathBuf,

        /// Where to write the exported document (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List registered capabilities, their states and hotkeys
    Capabilities,
    /// Run a scripted editing session against an in-memory scene
    Demo,
}

/// Host profile loaded from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Profile {
    debug: bool,
    workspace: WorkspaceProfile,
    history: HistoryProfile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct WorkspaceProfile {
    width: f64,
    height: f64,
}

impl Default for WorkspaceProfile {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 1200.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HistoryProfile {
    size: usize,
}

impl Default for HistoryProfile {
    fn default() -> Self {
        Self { size: 100 }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let profile = match load_profile(cli.profile.as_deref()).await {
        Ok(profile) => profile,
        Err(e) => {
            error!("Failed to load profile: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Import { file, out } => {
            run_import(profile.as_ref(), &file, out.as_deref()).await
        }
        Commands::Capabilities => run_capabilities(profile.as_ref()).await,
        Commands::Demo => run_demo(profile.as_ref()).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn load_profile(path: Option<&Path>) -> Result<Option<Profile>, EditorError> {
    let Some(path) = path else { return Ok(None) };
    let raw = tokio::fs::read_to_string(path).await?;
    let profile = toml::from_str(&raw)
        .map_err(|e| EditorError::Runtime(format!("invalid profile {}: {}", path.display(), e)))?;
    Ok(Some(profile))
}

/// Stand up an editor over an in-memory scene with the built-in
/// capability set, configured from the profile when one was given.
async fn build_editor(
    profile: Option<&Profile>,
) -> Result<(Editor, Arc<MemoryScene>), EditorError> {
    let options = EditorOptions {
        debug: profile.map(|p| p.debug).unwrap_or(false),
    };
    let editor = Editor::with_options(options);
    let scene = Arc::new(MemoryScene::new());
    editor.init(scene.clone());
    info!("Editor debug mode: {}", editor.options().debug);

    let descriptors = match profile {
        Some(profile) => vec![
            WorkspaceCapability::descriptor(json!({
                "width": profile.workspace.width,
                "height": profile.workspace.height,
            })),
            DocumentCapability::descriptor(),
            HistoryCapability::descriptor(json!({ "history_size": profile.history.size })),
            ContextMenuCapability::descriptor(),
            DeleteHotkeyCapability::descriptor(),
            MoveHotkeyCapability::descriptor(Value::Null),
        ],
        None => capabilities::default_set(),
    };
    editor.register(descriptors)?;

    // The session is usable once the workspace reports in and the ready
    // flag has flipped.
    editor
        .await_mounted(WorkspaceCapability::NAME, Some(Duration::from_secs(5)))
        .await?;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !editor.status().ready {
        if tokio::time::Instant::now() > deadline {
            return Err(EditorError::Runtime(
                "editor never became ready".to_string(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok((editor, scene))
}

fn document_capability(editor: &Editor) -> Result<Arc<DocumentCapability>, EditorError> {
    editor
        .lookup_as::<DocumentCapability>(DocumentCapability::NAME)
        .ok_or_else(|| EditorError::Runtime("document capability is not registered".to_string()))
}

async fn run_import(
    profile: Option<&Profile>,
    file: &Path,
    out: Option<&Path>,
) -> Result<(), EditorError> {
    let (editor, scene) = build_editor(profile).await?;
    let documents = document_capability(&editor)?;

    let raw = tokio::fs::read_to_string(file).await?;
    documents.load_json(&raw).await?;
    println!("Imported {} objects from {}", scene.len(), file.display());

    let exported = documents.to_json().await?;
    match out {
        Some(path) => {
            tokio::fs::write(path, exported).await?;
            println!("Exported document to {}", path.display());
        }
        None => println!("{}", exported),
    }

    editor.teardown().await;
    Ok(())
}

async fn run_capabilities(profile: Option<&Profile>) -> Result<(), EditorError> {
    let (editor, _scene) = build_editor(profile).await?;

    for name in editor.capability_names() {
        editor
            .await_mounted(&name, Some(Duration::from_secs(5)))
            .await?;
    }

    println!("Registered capabilities:");
    for name in editor.capability_names() {
        let state = editor
            .capability_state(&name)
            .map(|state| format!("{:?}", state))
            .unwrap_or_else(|| "unknown".to_string());
        let hotkeys: Vec<String> = editor
            .hotkeys_of(&name)
            .iter()
            .map(|hotkey| hotkey.to_string())
            .collect();
        if hotkeys.is_empty() {
            println!("  {} [{}]", name, state);
        } else {
            println!("  {} [{}] hotkeys: {}", name, state, hotkeys.join(", "));
        }
    }

    editor.teardown().await;
    Ok(())
}

async fn run_demo(profile: Option<&Profile>) -> Result<(), EditorError> {
    let (editor, scene) = build_editor(profile).await?;
    for name in editor.capability_names() {
        editor
            .await_mounted(&name, Some(Duration::from_secs(5)))
            .await?;
    }

    let documents = document_capability(&editor)?;
    let history = editor
        .lookup_as::<HistoryCapability>(HistoryCapability::NAME)
        .ok_or_else(|| EditorError::Runtime("history capability is not registered".to_string()))?;

    let mut rect = SceneObject::new("rect");
    rect.left = 40.0;
    rect.top = 40.0;
    rect.width = 120.0;
    rect.height = 80.0;
    rect.fill = Some("#336699".to_string());
    let rect_id = rect.id;
    documents.insert_object(rect);

    let mut caption = SceneObject::new("text");
    caption.left = 40.0;
    caption.top = 140.0;
    documents.insert_object(caption);
    println!("Inserted 2 objects; scene now holds {}", scene.len());

    editor.set_active(rect_id);
    let right: Hotkey = "right".parse()?;
    for _ in 0..3 {
        editor.dispatch_key(&KeyEvent::down(&right));
    }
    let moved_to = scene.get(rect_id).map(|object| object.left).unwrap_or(0.0);
    println!("Rect nudged to x = {}", moved_to);

    // Give the history listener a moment to snapshot, then step back once.
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("Undo applied: {}", history.undo());
    println!("Status: {:?}", editor.status());

    let exported = documents.to_json().await?;
    println!("{}", exported);

    editor.teardown().await;
    Ok(())
}
