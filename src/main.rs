use chrono::{Duration, Local};
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use inquire::{Confirm, DateSelect, Select, Text};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::Command;

use devis_maker::calc;
use devis_maker::config::{self, Settings};
use devis_maker::editor::{
    ChoiceField, ClientField, GuaranteeField, LineField, PrestationField, QuoteDetailsField, QuoteEditor,
    SectionField, SenderField, WarrantyFlag,
};
use devis_maker::error::{load_quote, save_quote};
use devis_maker::export::{ExportOptions, Exporter};
use devis_maker::format::{CurrencyFormat, Locale};
use devis_maker::layout::Theme;
use devis_maker::lenient::parse_number;
use devis_maker::model::{LineKind, LineType, PersonnelRole, QuoteDocument};
use devis_maker::profiles::{ProfileStore, profile_from_sender};
use devis_maker::store::FileStore;
use devis_maker::validate;

// ==========================================
// Constants
// ==========================================
const NEW_SENDER_OPT: &str = "➕ Nouvel émetteur";

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

// ==========================================
// CLI Definition
// ==========================================

#[derive(Parser)]
#[command(name = "devis-maker", version, about = "Build quotes and export them as PDF")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new quote interactively
    New {
        /// Where to save the quote (defaults to {data_root}/quotes/{number}.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show line and VAT totals of a saved quote
    Totals {
        file: PathBuf,
    },
    /// Export a saved quote to PDF
    Export {
        file: PathBuf,
        /// PDF theme (light or dark); defaults to the saved preference
        #[arg(long)]
        theme: Option<Theme>,
        /// Output directory (defaults to {data_root}/output/{year}/{client})
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Reveal the PDF once written
        #[arg(long)]
        open: bool,
    },
    /// Manage saved sender profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Configure data directory, locale and theme
    Config {
        #[arg(long)]
        theme: Option<Theme>,
        #[arg(long)]
        locale: Option<Locale>,
        #[arg(long)]
        data_root: Option<String>,
        #[arg(long)]
        logo_timeout_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List saved profiles
    List,
    /// Show one profile
    Show { id: String },
    /// Save the sender of a quote file as a profile
    Save {
        file: PathBuf,
        /// Profile name (defaults to the sender name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a profile
    Remove { id: String },
}

// ==========================================
// Main Function
// ==========================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        return;
    };

    if let Err(e) = run(command).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> CliResult {
    let config_path = config::config_path();
    let settings = config::load_settings(&config_path)?;
    let store = FileStore::new(settings.store_dir());

    match command {
        Commands::New { output } => new_quote_wizard(&settings, &store, output).await,
        Commands::Totals { file } => {
            let doc = load_quote(&file)?;
            show_totals(&doc, settings.locale);
            Ok(())
        }
        Commands::Export { file, theme, out_dir, open } => {
            let doc = load_quote(&file)?;
            let path = export_document(&settings, &store, &doc, theme, out_dir).await?;
            if open {
                open_and_reveal(&path);
            }
            Ok(())
        }
        Commands::Profile { command } => run_profile_command(&store, command),
        Commands::Config { theme, locale, data_root, logo_timeout_ms } => {
            let flags_given = theme.is_some() || locale.is_some() || data_root.is_some() || logo_timeout_ms.is_some();
            if flags_given {
                let mut settings = settings;
                if let Some(root) = data_root {
                    settings.data_root = root;
                }
                if let Some(locale) = locale {
                    settings.locale = locale;
                }
                if let Some(ms) = logo_timeout_ms {
                    settings.logo_timeout_ms = ms;
                }
                config::save_settings(&config_path, &settings)?;
                if let Some(theme) = theme {
                    config::store_theme(&FileStore::new(settings.store_dir()), theme)?;
                }
                println!("✅ Settings saved to {:?}", config_path);
                Ok(())
            } else {
                setup_config_wizard(&config_path, settings)
            }
        }
    }
}

// ==========================================
// 1. Quote Wizard
// ==========================================

fn ask(label: &str) -> CliResult<String> {
    Ok(Text::new(label).prompt()?)
}

fn ask_with_default(label: &str, default: &str) -> CliResult<String> {
    Ok(Text::new(label).with_default(default).prompt()?)
}

async fn new_quote_wizard(settings: &Settings, store: &FileStore, output: Option<PathBuf>) -> CliResult {
    let mut editor = QuoteEditor::new();
    editor.initialize_quote_number();

    println!("\n📝 --- Nouveau devis ---");
    choose_sender(&mut editor, store)?;

    println!("\n--- Client ---");
    let client_fields = [
        ("Nom du client:", ClientField::Name),
        ("Adresse:", ClientField::Address),
        ("Code postal:", ClientField::PostalCode),
        ("Ville:", ClientField::City),
        ("Téléphone:", ClientField::Phone),
        ("Email:", ClientField::Email),
    ];
    for (label, field) in client_fields {
        editor.set_client(field, &ask(label)?);
    }

    println!("\n--- Prestation ---");
    editor.set_prestation(PrestationField::Title, &ask("Titre (optionnel):")?);
    editor.set_prestation(PrestationField::Object, &ask("Objet (optionnel):")?);
    editor.set_prestation(PrestationField::Participants, &ask("Participants (optionnel):")?);

    enter_quote_details(&mut editor)?;
    enter_lines(&mut editor, settings.locale)?;
    enter_conditions(&mut editor)?;

    let doc = editor.into_document();
    show_totals(&doc, settings.locale);
    if let Err(e) = validate::validate(&doc) {
        println!("⚠️  {}", e);
    }

    let path = output.unwrap_or_else(|| {
        let stem = slug::slugify(&doc.quote_details.quote_number);
        settings.root().join("quotes").join(format!("{}.toml", stem))
    });
    save_quote(&path, &doc)?;
    println!("✅ Devis enregistré: {:?}", path);

    if Confirm::new("Générer le PDF maintenant ?").with_default(true).prompt()? {
        let pdf = export_document(settings, store, &doc, None, None).await?;
        open_and_reveal(&pdf);
    }
    Ok(())
}

fn choose_sender(editor: &mut QuoteEditor, store: &FileStore) -> CliResult {
    let profiles = ProfileStore::new(store);
    let saved = profiles.list()?;

    if !saved.is_empty() {
        let mut options: Vec<String> = saved.iter().map(|p| format!("{} ({})", p.name, p.sender.name)).collect();
        options.push(NEW_SENDER_OPT.to_string());
        let picked = Select::new("Émetteur:", options).raw_prompt()?;
        if let Some(profile) = saved.get(picked.index) {
            editor.load_profile(profile);
            println!("✅ Profil chargé: {}", profile.name);
            return Ok(());
        }
    }

    println!("\n--- Émetteur ---");
    let sender_fields = [
        ("Nom de l'entreprise:", SenderField::Name),
        ("Adresse:", SenderField::Address),
        ("Code postal:", SenderField::PostalCode),
        ("Ville:", SenderField::City),
        ("Téléphone:", SenderField::Phone),
        ("Email:", SenderField::Email),
        ("SIRET:", SenderField::Siret),
    ];
    for (label, field) in sender_fields {
        editor.set_sender(field, &ask(label)?);
    }

    let logo = ask("Logo (chemin vers une image, optionnel):")?;
    let logo = logo.trim();
    editor.set_logo((!logo.is_empty()).then(|| PathBuf::from(config::expand_home_dir(logo))));

    if Confirm::new("Enregistrer cet émetteur comme profil ?").with_default(true).prompt()? {
        let default_name = editor.document().sender.name.clone();
        let name = ask_with_default("Nom du profil:", &default_name)?;
        let saved = profiles.save(profile_from_sender(&editor.document().sender, &name))?;
        println!("✅ Profil enregistré: {}", saved.id);
    }
    Ok(())
}

fn enter_quote_details(editor: &mut QuoteEditor) -> CliResult {
    println!("\n--- Devis ---");
    let current = editor.document().quote_details.quote_number.clone();
    editor.set_quote_details(QuoteDetailsField::QuoteNumber, &ask_with_default("Numéro de devis:", &current)?);

    let today = Local::now().date_naive();
    let issued = DateSelect::new("Date d'émission:").with_default(today).prompt()?;
    editor.set_quote_details(QuoteDetailsField::IssueDate, &issued.format("%Y-%m-%d").to_string());

    if Confirm::new("Ajouter une date de validité ?").with_default(true).prompt()? {
        let valid = DateSelect::new("Date de validité:")
            .with_default(issued + Duration::days(30))
            .with_min_date(issued)
            .prompt()?;
        editor.set_quote_details(QuoteDetailsField::ValidityDate, &valid.format("%Y-%m-%d").to_string());
    }

    editor.set_free(Confirm::new("Devis gratuit ?").with_default(true).prompt()?);
    Ok(())
}

fn enter_lines(editor: &mut QuoteEditor, locale: Locale) -> CliResult {
    let money = locale.currency_format();
    println!("\n--- Lignes du devis ---");
    println!("(Laisser la désignation vide pour terminer)");

    loop {
        let description = ask("Désignation:")?;
        if description.trim().is_empty() {
            if editor.document().lines.is_empty() {
                println!("⚠️  Ajoutez au moins une ligne.");
                continue;
            }
            break;
        }

        let id = editor.add_line();
        editor.update_line(&id, LineField::Description, &description);

        let types = vec![LineType::Normal, LineType::Table, LineType::Choice, LineType::Personnel];
        let line_type = Select::new("Type de ligne:", types).prompt()?;
        editor.set_line_type(&id, line_type);

        match line_type {
            LineType::Normal | LineType::Table => {
                editor.update_line(&id, LineField::Quantity, &ask_with_default("Quantité:", "1")?);
                editor.update_line(&id, LineField::UnitPrice, &ask("Prix unitaire HT (€):")?);
            }
            LineType::Choice => loop {
                let label = ask("  Option (vide pour terminer):")?;
                if label.trim().is_empty() {
                    break;
                }
                if let Some(choice_id) = editor.add_choice(&id) {
                    editor.update_choice(&id, &choice_id, ChoiceField::Description, &label);
                    editor.update_choice(&id, &choice_id, ChoiceField::Quantity, &ask_with_default("  Quantité:", "1")?);
                    editor.update_choice(&id, &choice_id, ChoiceField::UnitPrice, &ask("  Prix unitaire HT (€):")?);
                }
            },
            LineType::Personnel => {
                for role in PersonnelRole::ALL {
                    let count = ask_with_default(&format!("  {} - nombre:", role.label()), "0")?;
                    if parse_number(&count).unwrap_or(0.0) == 0.0 {
                        continue;
                    }
                    let rate = ask(&format!("  {} - tarif unitaire HT (€):", role.label()))?;
                    editor.set_personnel(&id, role, &count, &rate);
                }
            }
        }

        editor.update_line(&id, LineField::VatRate, &ask_with_default("TVA (%):", "20")?);
        editor.update_line(&id, LineField::LongDescription, &ask("Description détaillée (optionnel):")?);

        if let Some(line) = editor.document().line(&id) {
            println!("✅ Ligne ajoutée: {} HT", money.format(calc::line_total_ht(line)));
        }
    }
    Ok(())
}

fn enter_conditions(editor: &mut QuoteEditor) -> CliResult {
    println!("\n--- Conditions ---");
    editor.set_quote_details(QuoteDetailsField::PaymentConditions, &ask("Conditions de paiement (optionnel):")?);

    let deposit = ask("Acompte en % (vide si aucun):")?;
    if !deposit.trim().is_empty() {
        let due = ask_with_default("Acompte exigible:", "à la signature du devis")?;
        editor.set_deposit(&deposit, &due, "");
    }

    let discharge = ask("Décharge de responsabilité, délai en heures (vide si aucun):")?;
    if let Ok(hours) = discharge.trim().parse::<u32>() {
        editor.set_discharge(Some(hours), "");
    }

    editor.set_warranty(
        WarrantyFlag::Legal,
        Confirm::new("Garantie légale de conformité ?").with_default(true).prompt()?,
    );
    editor.set_warranty(
        WarrantyFlag::HiddenDefects,
        Confirm::new("Garantie des vices cachés ?").with_default(true).prompt()?,
    );
    editor.set_guarantees(GuaranteeField::WarrantyDuration, &ask("Durée de garantie (optionnel):")?);
    editor.set_guarantees(GuaranteeField::AfterSalesService, &ask("Service après-vente (optionnel):")?);
    editor.set_guarantees(GuaranteeField::ComplaintsContact, &ask("Contact réclamations (optionnel):")?);

    println!("\n--- Déroulé de la prestation ---");
    println!("(Laisser le titre vide pour terminer)");
    loop {
        let title = ask("Titre de section:")?;
        if title.trim().is_empty() {
            break;
        }
        let id = editor.add_section();
        editor.update_section(&id, SectionField::Title, &title);
        editor.update_section(&id, SectionField::Content, &ask("Contenu:")?);
    }

    println!("\n--- Mentions légales ---");
    println!("(Laisser le titre vide pour terminer)");
    loop {
        let title = ask("Titre de la mention:")?;
        if title.trim().is_empty() {
            break;
        }
        let id = editor.add_legal_mention();
        editor.update_legal_mention(&id, SectionField::Title, &title);
        editor.update_legal_mention(&id, SectionField::Content, &ask("Contenu:")?);
    }
    Ok(())
}

// ==========================================
// 2. PDF Export
// ==========================================

async fn export_document(
    settings: &Settings,
    store: &FileStore,
    doc: &QuoteDocument,
    theme: Option<Theme>,
    out_dir: Option<PathBuf>,
) -> CliResult<PathBuf> {
    let date = doc.quote_details.issue_date.unwrap_or_else(|| Local::now().date_naive());
    let out_dir = out_dir.unwrap_or_else(|| config::output_dir(&settings.root(), date, &doc.client.name));

    let mut options = ExportOptions::new(out_dir);
    options.theme = theme.unwrap_or_else(|| config::stored_theme(store));
    options.locale = settings.locale;
    options.logo_timeout = settings.logo_timeout();

    println!("\n🔨 Génération du PDF (thème {})...", options.theme);
    let exported = Exporter::new().export(doc, &options).await?;
    println!("✅ PDF généré: {:?} ({} page(s))", exported.path, exported.pages);
    Ok(exported.path)
}

fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

// ==========================================
// 3. Totals Summary
// ==========================================

fn displayed_quantity(kind: &LineKind) -> Option<f64> {
    match kind {
        LineKind::Normal(p) | LineKind::Table(p) => p.quantity,
        LineKind::Choice(choices) => Some(calc::line_total_quantity(choices)),
        LineKind::Personnel(roles) => Some(roles.values().filter_map(|r| r.quantity).sum()),
    }
}

fn show_totals(doc: &QuoteDocument, locale: Locale) {
    let money: CurrencyFormat = locale.currency_format();

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Désignation"),
        Cell::new("Type"),
        Cell::new("Qté"),
        Cell::new("TVA"),
        Cell::new("Total HT"),
        Cell::new("Total TTC"),
    ]);

    for line in &doc.lines {
        let amounts = calc::line_amounts(line);
        let quantity = displayed_quantity(&line.kind).map(|q| money.compact(q)).unwrap_or_else(|| "-".into());
        let total_cell = if amounts.ht > 0.0 {
            Cell::new(money.format(amounts.ht))
        } else {
            Cell::new(money.format(amounts.ht)).fg(Color::Rgb { r: 185, g: 28, b: 28 })
        };
        table.add_row(vec![
            Cell::new(&line.description),
            Cell::new(line.line_type()),
            Cell::new(quantity).set_alignment(CellAlignment::Center),
            Cell::new(format!("{} %", money.compact(line.vat_rate))).set_alignment(CellAlignment::Center),
            total_cell.set_alignment(CellAlignment::Right),
            Cell::new(money.format(amounts.ttc)).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("\n--- Lignes ({}) ---", doc.quote_details.quote_number);
    println!("{table}");

    let totals = calc::aggregate(&doc.lines);
    let mut summary = Table::new();
    summary.set_header(vec![Cell::new("Taux"), Cell::new("Base HT"), Cell::new("TVA")]);
    for (rate, bucket) in totals.breakdown_descending() {
        summary.add_row(vec![
            Cell::new(format!("{} %", money.compact(rate))),
            Cell::new(money.format(bucket.ht)).set_alignment(CellAlignment::Right),
            Cell::new(money.format(bucket.vat)).set_alignment(CellAlignment::Right),
        ]);
    }
    summary.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(money.format(totals.total_ht)).add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
        Cell::new(money.format(totals.total_vat)).add_attribute(Attribute::Bold).set_alignment(CellAlignment::Right),
    ]);

    println!("\n--- TVA ---");
    println!("{summary}");
    println!(
        "💶 Total TTC: {}",
        money.format(totals.total_ttc)
    );
}

// ==========================================
// 4. Sender Profiles
// ==========================================

fn run_profile_command(store: &FileStore, command: ProfileCommands) -> CliResult {
    let profiles = ProfileStore::new(store);

    match command {
        ProfileCommands::List => {
            let saved = profiles.list()?;
            if saved.is_empty() {
                println!("🔍 Aucun profil enregistré.");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_header(vec![
                Cell::new("Id"),
                Cell::new("Profil"),
                Cell::new("Émetteur"),
                Cell::new("Email"),
                Cell::new("Modifié"),
            ]);
            for p in saved {
                table.add_row(vec![
                    Cell::new(&p.id),
                    Cell::new(&p.name).add_attribute(Attribute::Bold),
                    Cell::new(&p.sender.name),
                    Cell::new(&p.sender.email),
                    Cell::new(p.updated_at.with_timezone(&Local).format("%d/%m/%Y %H:%M")),
                ]);
            }
            println!("{table}");
        }
        ProfileCommands::Show { id } => {
            let Some(p) = profiles.get_by_id(&id)? else {
                println!("❌ Profil introuvable: {}", id);
                return Ok(());
            };
            let s = &p.sender;
            println!("📇 {} ({})", p.name, p.id);
            println!("   {}", s.name);
            println!("   {}", devis_maker::model::postal_line(&s.address, &s.postal_code, &s.city));
            println!("   {} / {}", s.phone, s.email);
            if !s.siret.is_empty() {
                println!("   SIRET: {}", s.siret);
            }
            if let Some(logo) = &s.logo {
                println!("   Logo: {:?}", logo);
            }
        }
        ProfileCommands::Save { file, name } => {
            let doc = load_quote(&file)?;
            let name = name.unwrap_or_else(|| doc.sender.name.clone());
            let saved = profiles.save(profile_from_sender(&doc.sender, &name))?;
            println!("✅ Profil enregistré: {} ({})", saved.name, saved.id);
        }
        ProfileCommands::Remove { id } => {
            let confirmed = Confirm::new(&format!("Supprimer le profil {} ?", id)).with_default(false).prompt()?;
            if !confirmed {
                println!("Operation cancelled.");
            } else if profiles.remove(&id)? {
                println!("🗑️  Profil supprimé.");
            } else {
                println!("❌ Profil introuvable: {}", id);
            }
        }
    }
    Ok(())
}

// ==========================================
// 5. Config
// ==========================================

fn setup_config_wizard(config_path: &Path, current: Settings) -> CliResult {
    println!("\n⚙️  --- Configuration ---");

    let data_root = ask_with_default("Dossier de données:", &current.data_root)?;
    let locale = Select::new("Format des montants:", vec![Locale::FrFr, Locale::EnUs]).prompt()?;
    let timeout = ask_with_default("Délai de chargement du logo (ms):", &current.logo_timeout_ms.to_string())?;

    let settings = Settings {
        data_root,
        locale,
        logo_timeout_ms: timeout.trim().parse().unwrap_or(current.logo_timeout_ms),
    };
    config::save_settings(config_path, &settings)?;

    let store = FileStore::new(settings.store_dir());
    let current_theme = config::stored_theme(&store);
    let themes = if current_theme == Theme::Dark {
        vec![Theme::Dark, Theme::Light]
    } else {
        vec![Theme::Light, Theme::Dark]
    };
    let theme = Select::new("Thème du PDF:", themes).prompt()?;
    config::store_theme(&store, theme)?;

    println!("✅ Settings saved.");
    Ok(())
}
