//! Interactive console: command dispatch and the question flow.
//!
//! Owns the session state the stores deliberately do not: the active
//! context name, the context-enabled flag, and the session setting
//! overrides. Destructive commands confirm here before the stores'
//! unconditional delete operations are invoked.

use anyhow::Result;
use std::io::Write as _;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::config::Config;
use crate::files;
use crate::history::{ContextStore, Role};
use crate::llm::ChatClient;
use crate::session::SessionSettings;
use crate::store::VectorStore;

type Input = Lines<BufReader<Stdin>>;

/// The context that always exists, even with zero stored turns.
const DEFAULT_CONTEXT: &str = "default";

/// Why a context lifecycle request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDenied {
    /// The named context has no stored turns (and is not `default`).
    NotFound,
    /// A context with that name already has turns.
    AlreadyExists,
    /// The name is the currently active context.
    Active,
}

/// The active-context state machine. The store deletes and switches
/// unconditionally; every guard decision happens here, before any store
/// operation is invoked.
#[derive(Debug)]
pub struct ActiveContext {
    name: String,
}

impl ActiveContext {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_CONTEXT.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `default` always exists; any other name needs at least one turn.
    pub async fn exists(store: &ContextStore, name: &str) -> bool {
        name == DEFAULT_CONTEXT || store.context_exists(name).await
    }

    /// Switch to an existing context.
    pub async fn switch_to(&mut self, store: &ContextStore, name: &str) -> Result<(), ContextDenied> {
        if !Self::exists(store, name).await {
            return Err(ContextDenied::NotFound);
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Create a fresh context and switch to it. The name is claimed in
    /// memory only; it persists once its first turn is written.
    pub async fn create(&mut self, store: &ContextStore, name: &str) -> Result<(), ContextDenied> {
        if store.context_exists(name).await {
            return Err(ContextDenied::AlreadyExists);
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Check whether a context may be deleted: never the active one, and
    /// only names that actually have turns.
    pub async fn can_delete(&self, store: &ContextStore, name: &str) -> Result<(), ContextDenied> {
        if name == self.name {
            return Err(ContextDenied::Active);
        }
        if !store.context_exists(name).await {
            return Err(ContextDenied::NotFound);
        }
        Ok(())
    }
}

impl Default for ActiveContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Console {
    config: Config,
    store: VectorStore,
    history: ContextStore,
    chat: ChatClient,
    settings: SessionSettings,
    active: ActiveContext,
    context_enabled: bool,
}

impl Console {
    pub fn new(config: Config, store: VectorStore, history: ContextStore, chat: ChatClient) -> Self {
        let context_enabled = config.history.enabled;
        Self {
            config,
            store,
            history,
            chat,
            settings: SessionSettings::new(),
            active: ActiveContext::new(),
            context_enabled,
        }
    }

    /// Main loop: read a line, dispatch a `!` command or treat it as a
    /// question. Returns on `!quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!();
        println!("--- RAG Interactive Console ---");
        println!("Type your question and press Enter. For a list of commands, type !help.");
        println!("-------------------------------");
        println!();

        let mut input = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("(rag) > ");
            std::io::stdout().flush()?;

            // Ctrl+C at the prompt ends the session. The streaming path
            // installs a SIGINT listener too, so after the first question
            // the default terminate disposition is gone for good; without
            // a branch here the signal would be silently swallowed.
            let line = tokio::select! {
                line = input.next_line() => line?,
                _ = tokio::signal::ctrl_c() => break,
            };
            let Some(line) = line else {
                break;
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('!') {
                let mut parts = rest.split_whitespace();
                let command = parts.next().unwrap_or_default();
                let args: Vec<&str> = parts.collect();

                match command {
                    "quit" => break,
                    "help" => self.handle_help(),
                    "status" => self.handle_status().await,
                    "index" => self.handle_index(false).await,
                    "reindex" => self.handle_index(true).await,
                    "reindex-file" => self.handle_reindex_file(args.first().copied()).await,
                    "purge" => self.handle_purge(&mut input).await?,
                    "context-on" => {
                        self.context_enabled = true;
                        println!("\nContext history ENABLED.\n");
                    }
                    "context-off" => {
                        self.context_enabled = false;
                        println!("\nContext history DISABLED.\n");
                    }
                    "context-list" => self.handle_context_list().await,
                    "context-switch" => self.handle_context_switch(args.first().copied()).await,
                    "context-new" => self.handle_context_new(args.first().copied()).await,
                    "context-delete" => {
                        self.handle_context_delete(args.first().copied(), &mut input)
                            .await?
                    }
                    "settings" => self.handle_setting_set(&args),
                    other => {
                        println!(
                            "Unknown command: '!{}'. Type !help for available commands.",
                            other
                        );
                    }
                }
            } else {
                self.handle_question(&line).await;
            }
        }

        println!("\nShutting down. Goodbye!");
        Ok(())
    }

    fn handle_help(&self) {
        println!();
        println!("--- RAG Console Help ---");
        println!("Commands:");
        println!("  !index            - Index new or changed files in the corpus root.");
        println!("  !reindex          - Force re-indexing of all files in the corpus root.");
        println!("  !reindex-file <p> - Force re-indexing of a single file. <p> is the path.");
        println!("  !status           - Show the number of currently indexed files.");
        println!("  !purge            - Clear all indexed data and all conversation history.");
        println!("  !help             - Show this help message.");
        println!("  !quit             - Exit the application.");
        println!();
        println!("Context Management:");
        println!("  !context-on         - Enable conversation history for subsequent questions.");
        println!("  !context-off        - Disable conversation history (one-shot questions).");
        println!("  !context-list       - Show a list of all saved conversation contexts.");
        println!("  !context-switch <n> - Switch to an existing conversation context named <n>.");
        println!("  !context-new <n>    - Create and switch to a new, empty context named <n>.");
        println!("  !context-delete <n> - Permanently delete the conversation context named <n>.");
        println!();
        println!("Session Settings:");
        println!("  !settings <param> <value> - Change a setting for the current session only.");
        println!(
            "    - available params: {}",
            SessionSettings::allowed_params().collect::<Vec<_>>().join(", ")
        );
        println!();
        println!("To ask a question, simply type it and press Enter.");
        println!("------------------------");
        println!();
    }

    async fn handle_status(&self) {
        match self.store.indexed_file_count().await {
            Ok(count) => {
                println!(
                    "\n[Status] Currently {} files are indexed in the database.",
                    count
                );
                println!(
                    "[Status] Active context: '{}' (history {}).\n",
                    self.active.name(),
                    if self.context_enabled { "on" } else { "off" }
                );
            }
            Err(e) => eprintln!("\nError reading status: {}\n", e),
        }
    }

    /// Index the configured corpus root. A failure on one file never
    /// aborts the rest of the run.
    async fn handle_index(&self, force: bool) {
        let verb = if force { "re-indexing" } else { "indexing" };
        println!("\nStarting {} of the corpus root...", verb);
        let started = std::time::Instant::now();

        let paths = match files::scan_files(&self.config.indexing) {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("Error: {}\n", e);
                return;
            }
        };

        if paths.is_empty() {
            println!(
                "No files found to index under '{}'.\n",
                self.config.indexing.root.display()
            );
            return;
        }

        println!("Found {} files.", paths.len());
        let total = paths.len();
        let mut processed = 0usize;

        for (i, path) in paths.iter().enumerate() {
            println!("  [{}/{}] {}", i + 1, total, path.display());
            match self.store.index_file(path, force).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => eprintln!("  Error indexing {}: {}", path.display(), e),
            }
        }

        println!(
            "\nIndexing completed. {} files processed in {:.2}s.\n",
            processed,
            started.elapsed().as_secs_f64()
        );
    }

    async fn handle_reindex_file(&self, path: Option<&str>) {
        let Some(path) = path else {
            println!("\nError: Missing file path. Usage: !reindex-file <path_to_file>\n");
            return;
        };
        let path = Path::new(path);
        if !path.exists() {
            println!("\nError: The file '{}' does not exist.\n", path.display());
            return;
        }

        println!("\nForcing re-indexing of file: {}...", path.display());
        let started = std::time::Instant::now();
        match self.store.index_file(path, true).await {
            Ok(true) => println!(
                "File successfully re-indexed in {:.2}s.\n",
                started.elapsed().as_secs_f64()
            ),
            Ok(false) => println!("Could not re-index the file. Check for errors above.\n"),
            Err(e) => eprintln!("Error re-indexing {}: {}\n", path.display(), e),
        }
    }

    async fn handle_purge(&self, input: &mut Input) -> Result<()> {
        println!("\nWARNING: This will permanently delete ALL indexed data and ALL conversation history.");
        if !confirm(input).await? {
            println!("Purge operation cancelled.\n");
            return Ok(());
        }

        println!("Purging database...");
        let embeddings_cleared = self.store.purge().await;
        let history_cleared = self.history.purge().await;
        if embeddings_cleared && history_cleared {
            println!("Database has been successfully cleared.\n");
        } else {
            println!("An error occurred while purging the database.\n");
        }
        Ok(())
    }

    async fn handle_context_list(&self) {
        match self.history.list_contexts().await {
            Ok(contexts) if contexts.is_empty() => {
                println!("\nNo conversation contexts found.\n");
            }
            Ok(contexts) => {
                println!("\nAvailable contexts:");
                for name in contexts {
                    let marker = if name == self.active.name() { " (active)" } else { "" };
                    println!("  - {}{}", name, marker);
                }
                println!();
            }
            Err(e) => eprintln!("\nError listing contexts: {}\n", e),
        }
    }

    async fn handle_context_switch(&mut self, name: Option<&str>) {
        let Some(name) = name else {
            println!("\nError: Missing context name. Usage: !context-switch <name>\n");
            return;
        };
        match self.active.switch_to(&self.history, name).await {
            Ok(()) => println!("\nSwitched to context: '{}'.\n", name),
            Err(_) => println!("\nError: Context '{}' not found.\n", name),
        }
    }

    async fn handle_context_new(&mut self, name: Option<&str>) {
        let Some(name) = name else {
            println!("\nError: Missing context name. Usage: !context-new <name>\n");
            return;
        };
        match self.active.create(&self.history, name).await {
            Ok(()) => {
                println!("\nCreated and switched to new context: '{}'.", name);
                println!("This context will be saved permanently after the first message.\n");
            }
            Err(_) => println!(
                "\nError: Context '{}' already exists. Use !context-switch to activate it.\n",
                name
            ),
        }
    }

    async fn handle_context_delete(&self, name: Option<&str>, input: &mut Input) -> Result<()> {
        let Some(name) = name else {
            println!("\nError: Missing context name. Usage: !context-delete <name>\n");
            return Ok(());
        };
        match self.active.can_delete(&self.history, name).await {
            Err(ContextDenied::Active) => {
                println!(
                    "\nError: Cannot delete the currently active context ('{}').\n",
                    self.active.name()
                );
                return Ok(());
            }
            Err(_) => {
                println!("\nError: Context '{}' not found.\n", name);
                return Ok(());
            }
            Ok(()) => {}
        }

        println!(
            "\nWARNING: This will permanently delete the entire conversation history for '{}'.",
            name
        );
        if !confirm(input).await? {
            println!("Delete operation cancelled.\n");
            return Ok(());
        }

        if self.history.delete_context(name).await {
            println!("Successfully deleted context: '{}'.\n", name);
        } else {
            println!("An error occurred while deleting context '{}'.\n", name);
        }
        Ok(())
    }

    fn handle_setting_set(&mut self, args: &[&str]) {
        if args.len() < 2 {
            println!("\nError: Missing parameter and value. Usage: !settings <param> <value>\n");
            return;
        }
        let param = args[0].to_lowercase();
        let value = args[1..].join(" ");

        match self.settings.set(&param, &value) {
            Ok(()) => {
                println!(
                    "\nSession setting updated: '{}' is now {}.",
                    param, value
                );
                println!("This change is temporary and will be lost on exit.\n");
            }
            Err(e) => println!("\nError: {}\n", e),
        }
    }

    /// Retrieve context for the question, stream the answer, and record
    /// both turns when history is enabled. A retrieval failure degrades to
    /// an answer without context; it never aborts the question.
    async fn handle_question(&mut self, question: &str) {
        println!("\nSearching for relevant context in the database...");

        let chunks = match self
            .store
            .find_relevant_chunks(question, self.config.retrieval.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                eprintln!("Error during retrieval: {}", e);
                Vec::new()
            }
        };

        let rag_context = if chunks.is_empty() {
            println!("Could not find relevant context for your question. The LLM will answer without it.\n");
            "No context found.".to_string()
        } else {
            println!("Context found. Sending to LLM...\n");
            chunks.join("\n---\n")
        };

        let prior_turns = if self.context_enabled {
            match self
                .history
                .get_history(self.active.name(), Some(self.config.history.max_turns))
                .await
            {
                Ok(turns) => turns,
                Err(e) => {
                    eprintln!("Error loading history: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut stream = match self
            .chat
            .ask(&prior_turns, &rag_context, question, &self.settings)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                eprintln!("{:#}\nEnsure the server is running.\n", e);
                return;
            }
        };

        println!("--- Answer from LLM ---");
        let mut answer = String::new();
        let mut completed = true;

        loop {
            tokio::select! {
                token = stream.next_token() => match token {
                    Ok(Some(token)) => {
                        print!("{}", token);
                        let _ = std::io::stdout().flush();
                        answer.push_str(&token);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("\n{}", e);
                        completed = false;
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    // Dropping the stream closes the connection
                    println!("\n[interrupted]");
                    completed = false;
                    break;
                }
            }
        }
        println!("\n-----------------------\n");

        if completed && self.context_enabled {
            self.history
                .append_turn(self.active.name(), Role::User, question)
                .await;
            self.history
                .append_turn(self.active.name(), Role::Assistant, &answer)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    async fn context_store() -> (tempfile::TempDir, ContextStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("rag.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, ContextStore::new(pool))
    }

    #[tokio::test]
    async fn test_default_context_exists_without_turns() {
        let (_tmp, store) = context_store().await;
        assert!(ActiveContext::exists(&store, DEFAULT_CONTEXT).await);
        assert!(!ActiveContext::exists(&store, "elsewhere").await);
    }

    #[tokio::test]
    async fn test_switch_rejects_unknown_context() {
        let (_tmp, store) = context_store().await;
        let mut active = ActiveContext::new();

        assert_eq!(
            active.switch_to(&store, "ghost").await,
            Err(ContextDenied::NotFound)
        );
        assert_eq!(active.name(), DEFAULT_CONTEXT);

        store.append_turn("work", Role::User, "hi").await;
        active.switch_to(&store, "work").await.unwrap();
        assert_eq!(active.name(), "work");

        // Back to default is always allowed, turns or not
        active.switch_to(&store, DEFAULT_CONTEXT).await.unwrap();
        assert_eq!(active.name(), DEFAULT_CONTEXT);
    }

    #[tokio::test]
    async fn test_create_rejects_existing_context() {
        let (_tmp, store) = context_store().await;
        let mut active = ActiveContext::new();

        store.append_turn("taken", Role::User, "hi").await;
        assert_eq!(
            active.create(&store, "taken").await,
            Err(ContextDenied::AlreadyExists)
        );
        assert_eq!(active.name(), DEFAULT_CONTEXT);

        active.create(&store, "fresh").await.unwrap();
        assert_eq!(active.name(), "fresh");
    }

    #[tokio::test]
    async fn test_delete_guards_active_and_missing_contexts() {
        let (_tmp, store) = context_store().await;
        let mut active = ActiveContext::new();

        store.append_turn("work", Role::User, "hi").await;
        store.append_turn("play", Role::User, "yo").await;
        active.switch_to(&store, "work").await.unwrap();

        // The active context cannot be deleted while active
        assert_eq!(
            active.can_delete(&store, "work").await,
            Err(ContextDenied::Active)
        );
        assert_eq!(
            active.can_delete(&store, "ghost").await,
            Err(ContextDenied::NotFound)
        );
        assert_eq!(active.can_delete(&store, "play").await, Ok(()));

        // After switching away the old context becomes deletable
        active.switch_to(&store, DEFAULT_CONTEXT).await.unwrap();
        assert_eq!(active.can_delete(&store, "work").await, Ok(()));
    }
}

/// Y/N confirmation on the console's own input stream.
async fn confirm(input: &mut Input) -> Result<bool> {
    print!("Are you sure you want to continue? (Y/N): ");
    std::io::stdout().flush()?;
    let answer = input.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
