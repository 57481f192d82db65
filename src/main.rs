use std::io::{self, BufRead, Read};
use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Parser;
use translate_compare::{
    ComparisonRequest, Config, InstructionSelection, Session, SpiceLevel, StyleRuleCatalog,
    example_texts, languages, settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "translate-compare",
    version,
    about = "Compare a plain translation with one shaped by style rules and custom instructions"
)]
struct Cli {
    /// Target language (default: de)
    #[arg(short = 'l', long = "lang", default_value = "de")]
    lang: String,

    /// Source language. Use "auto" to detect.
    #[arg(short = 'L', long = "source-lang", default_value = "auto")]
    source_lang: String,

    /// DeepL API key (overrides saved settings and DEEPL_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Style rule id applied to the custom translation
    #[arg(short = 's', long = "style-rule")]
    style_rule: Option<String>,

    /// Custom instruction for the custom translation (repeatable)
    #[arg(short = 'c', long = "instruction")]
    instructions: Vec<String>,

    /// Show a word diff between the two translations
    #[arg(long = "diff")]
    diff: bool,

    /// Send requests through a relay server instead of DeepL directly
    #[arg(long = "relay")]
    relay: Option<String>,

    /// List available style rules and exit
    #[arg(long = "show-style-rules")]
    show_style_rules: bool,

    /// Generate candidate instructions and exit
    #[arg(long = "generate-instructions")]
    generate_instructions: bool,

    /// Creativity for --generate-instructions (normal, spicy, nuclear)
    #[arg(long = "spice", default_value = "normal")]
    spice: SpiceLevel,

    /// Show the saved configuration and exit
    #[arg(long = "show-settings")]
    show_settings: bool,

    /// Save --key, --proxy-url and --debug-logs to the configuration
    #[arg(long = "save-settings")]
    save_settings: bool,

    /// OpenAI-compatible proxy URL for instruction generation
    #[arg(long = "proxy-url")]
    proxy_url: Option<String>,

    /// Show request payloads and timing (true/false; the bare flag means true)
    #[arg(
        long = "debug-logs",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    debug_logs: Option<bool>,

    /// Delete the saved configuration and exit
    #[arg(long = "clear-settings")]
    clear_settings: bool,

    /// Compare a built-in example text instead of reading stdin
    #[arg(short = 'e', long = "example", value_name = "ID")]
    example: Option<String>,

    /// List the built-in example texts and exit
    #[arg(long = "list-examples")]
    list_examples: bool,

    /// Run the relay server (default address from settings)
    #[arg(long = "server", num_args = 0..=1, default_missing_value = "")]
    server: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Interactive mode
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    translate_compare::logging::init(cli.verbose)?;

    if let Some(addr) = cli.server.as_deref() {
        let settings = settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;
        let addr = if addr.trim().is_empty() {
            settings.server_addr.clone()
        } else {
            addr.trim().to_string()
        };
        return translate_compare::server::run_server(settings, addr).await;
    }
    if cli.interactive {
        return run_interactive(cli).await;
    }

    let needs_input = !(cli.show_style_rules
        || cli.generate_instructions
        || cli.show_settings
        || cli.save_settings
        || cli.clear_settings
        || cli.list_examples
        || cli.example.is_some());
    let input = if needs_input {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = translate_compare::run(
        Config {
            lang: cli.lang,
            source_lang: cli.source_lang,
            key: cli.key,
            style_rule: cli.style_rule,
            instructions: cli.instructions,
            diff: cli.diff,
            relay: cli.relay,
            settings_path: cli.read_settings,
            show_style_rules: cli.show_style_rules,
            generate_instructions: cli.generate_instructions,
            spice: cli.spice,
            show_settings: cli.show_settings,
            save_settings: cli.save_settings,
            proxy_url: cli.proxy_url,
            debug_logs: cli.debug_logs,
            clear_settings: cli.clear_settings,
            example: cli.example,
            list_examples: cli.list_examples,
        },
        input,
    )
    .await?;

    println!("{}", output);
    Ok(())
}

struct InteractiveState {
    session: Session,
    key: Option<String>,
    lang: String,
    source_lang: String,
    catalog: StyleRuleCatalog,
    pending_style_rule: Option<String>,
    selection: InstructionSelection,
    diff: bool,
    debug: bool,
}

impl InteractiveState {
    fn new(cli: &Cli) -> Result<Self> {
        let session = Session::open(cli.read_settings.as_deref(), cli.relay.as_deref())?;
        let mut selection = InstructionSelection::new(session.settings().instructions);
        for instruction in &cli.instructions {
            selection.add_manual(instruction)?;
        }
        let debug = cli
            .debug_logs
            .unwrap_or_else(|| session.configuration().show_debug_logs);
        Ok(Self {
            key: cli.key.clone(),
            lang: languages::validate_target(&cli.lang)?.to_string(),
            source_lang: languages::validate_source(&cli.source_lang)?.to_string(),
            catalog: StyleRuleCatalog::new(),
            pending_style_rule: cli.style_rule.clone(),
            selection,
            diff: cli.diff,
            debug,
            session,
        })
    }

    fn key(&self) -> Result<String> {
        self.session.resolve_key(self.key.as_deref())
    }

    async fn refresh_style_rules(&mut self) -> Result<()> {
        let key = self.key()?;
        let rules = self.session.fetch_style_rules(&key).await?;
        self.catalog.replace(rules);
        if let Some(id) = self.pending_style_rule.take() {
            self.catalog.select(Some(&id))?;
        }
        Ok(())
    }

    fn style_rule_id(&self) -> Option<String> {
        self.catalog
            .selected_id()
            .map(str::to_string)
            .or_else(|| self.pending_style_rule.clone())
    }

    async fn compare(&self, text: &str) -> Result<()> {
        let key = self.key()?;
        let request = ComparisonRequest {
            text: text.to_string(),
            source_lang: self.source_lang.clone(),
            target_lang: self.lang.clone(),
            style_rule_id: self.style_rule_id(),
            instructions: self.selection.active(),
        };
        let Some(comparison) = self.session.compare(&key, &request).await? else {
            return Ok(());
        };
        let style_rule_name = self.catalog.selected().map(|rule| rule.name.as_str());
        println!(
            "{}",
            translate_compare::format_comparison(
                &comparison,
                style_rule_name,
                self.diff,
                self.debug
            )
        );
        Ok(())
    }
}

async fn run_interactive(cli: Cli) -> Result<()> {
    use std::io::Write;

    let mut state = InteractiveState::new(&cli)?;
    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        line.clear();
        print!("> ");
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.starts_with('/') {
            match handle_interactive_command(input, &mut state).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => eprintln!("error: {:#}", err),
            }
            continue;
        }

        if let Err(err) = state.compare(input).await {
            eprintln!("error: {:#}", err);
        }
    }
    Ok(())
}

async fn handle_interactive_command(input: &str, state: &mut InteractiveState) -> Result<bool> {
    let trimmed = input.trim();
    if matches!(trimmed, "/quit" | "/exit") {
        return Ok(true);
    }
    if trimmed == "/help" {
        print_interactive_help();
        return Ok(false);
    }
    if trimmed == "/style-rules" {
        state.refresh_style_rules().await?;
        println!("{}", translate_compare::format_catalog(&state.catalog));
        return Ok(false);
    }
    if trimmed == "/style-rule" {
        println!(
            "style rule: {}",
            state.style_rule_id().as_deref().unwrap_or("(none)")
        );
        return Ok(false);
    }
    if trimmed == "/examples" {
        println!("{}", example_texts::format_example_list());
        return Ok(false);
    }
    if trimmed == "/instructions" {
        print_instructions(state);
        return Ok(false);
    }
    if trimmed == "/clear-instructions" {
        state.selection.clear();
        println!("instructions cleared");
        return Ok(false);
    }

    if let Some(arg) = trimmed.strip_prefix("/example ") {
        let example = example_texts::find(arg)?;
        println!(
            "[{}] {}",
            example_texts::category_label(example.category),
            example.text
        );
        state.compare(example.text).await?;
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/style-rule ") {
        let value = arg.trim();
        if value == "clear" {
            state.catalog.select(None)?;
            state.pending_style_rule = None;
            println!("style rule cleared");
            return Ok(false);
        }
        if state.catalog.is_empty() {
            state.refresh_style_rules().await?;
        }
        state.catalog.select(Some(value))?;
        let name = state
            .catalog
            .selected()
            .map(|rule| rule.name.clone())
            .unwrap_or_default();
        println!("style rule set to {} ({})", value, name);
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/roll") {
        let value = arg.trim();
        let level = if value.is_empty() {
            SpiceLevel::default()
        } else {
            value.parse::<SpiceLevel>()?
        };
        let generated = state.session.generate_instructions(level).await?;
        println!("{}", translate_compare::format_generated(&generated));
        state.selection.replace_generated(generated);
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/pick") {
        let index = parse_position(arg)?;
        let picked = state.selection.toggle(index)?;
        println!(
            "instruction #{} {}",
            index + 1,
            if picked { "picked" } else { "unpicked" }
        );
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/add") {
        state.selection.add_manual(arg)?;
        println!("instruction added");
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/remove") {
        let index = parse_position(arg)?;
        let removed = state.selection.remove_manual(index)?;
        println!("removed: {}", removed);
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/diff") {
        state.diff = parse_toggle(arg, state.diff)?;
        println!("diff: {}", state.diff);
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/debug") {
        state.debug = parse_toggle(arg, state.debug)?;
        println!("debug: {}", state.debug);
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/source-lang") {
        let value = arg.trim();
        if value.is_empty() {
            println!("source-lang: {}", state.source_lang);
        } else {
            state.source_lang = languages::validate_source(value)?.to_string();
            println!("source-lang set to {}", state.source_lang);
        }
        return Ok(false);
    }
    if let Some(arg) = trimmed.strip_prefix("/lang") {
        let value = arg.trim();
        if value.is_empty() {
            println!("lang: {}", state.lang);
        } else {
            state.lang = languages::validate_target(value)?.to_string();
            println!(
                "lang set to {} ({})",
                state.lang,
                languages::language_name(&state.lang).unwrap_or_default()
            );
        }
        return Ok(false);
    }

    eprintln!("unknown command: {}", trimmed);
    Ok(false)
}

fn print_instructions(state: &InteractiveState) {
    let generated = state.selection.generated();
    if !generated.is_empty() {
        println!("generated:");
        for (index, item) in generated.iter().enumerate() {
            let marker = if state.selection.picked().contains(&item.instruction) {
                "*"
            } else {
                " "
            };
            println!(
                "{} {}. [{}] {}",
                marker,
                index + 1,
                item.category.as_str(),
                item.instruction
            );
        }
    }
    let manual = state.selection.manual();
    if !manual.is_empty() {
        println!("manual:");
        for (index, instruction) in manual.iter().enumerate() {
            println!("  {}. {}", index + 1, instruction);
        }
    }
    if generated.is_empty() && manual.is_empty() {
        println!("no instructions");
    }
}

/// 1-based position typed by the user to 0-based index.
fn parse_position(arg: &str) -> Result<usize> {
    let value = arg.trim();
    match value.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position - 1),
        _ => Err(anyhow!("expected a number starting at 1, got '{}'", value)),
    }
}

fn parse_toggle(arg: &str, current: bool) -> Result<bool> {
    let value = arg.trim();
    if value.is_empty() {
        return Ok(!current);
    }
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(anyhow!("expected on/off/true/false/1/0")),
    }
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /lang <code>                 Set target language (or show current)");
    println!("  /source-lang <code|auto>     Set source language (or show current)");
    println!("  /examples                    List built-in example texts");
    println!("  /example <id>                Compare a built-in example text");
    println!("  /style-rules                 Fetch and list style rules");
    println!("  /style-rule <id|clear>       Select or clear the style rule");
    println!("  /roll [normal|spicy|nuclear] Generate candidate instructions");
    println!("  /pick <n>                    Pick or unpick generated instruction n");
    println!("  /add <text>                  Add a manual instruction");
    println!("  /remove <n>                  Remove manual instruction n");
    println!("  /instructions                Show generated and manual instructions");
    println!("  /clear-instructions          Drop picked and manual instructions");
    println!("  /diff [on|off]               Toggle word diff");
    println!("  /debug [on|off]              Toggle payload and timing output");
    println!("Any other line is translated and compared.");
}
