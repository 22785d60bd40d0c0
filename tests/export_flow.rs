use chrono::NaiveDate;
use devis_maker::config;
use devis_maker::editor::{ClientField, LineField, QuoteDetailsField, QuoteEditor, SenderField};
use devis_maker::error::{load_quote, save_quote};
use devis_maker::model::{LineType, PersonnelRole};
use devis_maker::{ExportError, ExportOptions, Exporter};

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn catering_quote(extra_lines: usize) -> QuoteEditor {
    let mut editor = QuoteEditor::new();
    editor.set_sender(SenderField::Name, "Traiteur Martin");
    editor.set_sender(SenderField::Email, "contact@martin.fr");
    editor.set_client(ClientField::Name, "Mairie de Lyon");
    editor.set_quote_details(QuoteDetailsField::QuoteNumber, "DEV-20261018-042");
    editor.set_quote_details(QuoteDetailsField::IssueDate, "18/10/2026");

    let cocktail = editor.add_line();
    editor.update_line(&cocktail, LineField::Description, "Cocktail dînatoire");
    editor.update_line(&cocktail, LineField::Quantity, "80");
    editor.update_line(&cocktail, LineField::UnitPrice, "24,50");
    editor.update_line(&cocktail, LineField::VatRate, "10");

    let staff = editor.add_line();
    editor.update_line(&staff, LineField::Description, "Service");
    editor.set_line_type(&staff, LineType::Personnel);
    editor.set_personnel(&staff, PersonnelRole::Server, "3", "180");

    for i in 0..extra_lines {
        let id = editor.add_line();
        editor.update_line(&id, LineField::Description, &format!("Option {}", i));
        editor.update_line(&id, LineField::UnitPrice, "5");
    }
    editor
}

#[tokio::test]
async fn edited_quote_exports_to_a_single_page_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let editor = catering_quote(0);

    let totals = editor.totals();
    assert_eq!(totals.total_ht, 2500.0);
    assert_eq!(totals.total_ttc, 2804.0);

    let out_dir = config::output_dir(dir.path(), NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(), "Mairie de Lyon");
    let exported = Exporter::new()
        .export(editor.document(), &ExportOptions::new(&out_dir))
        .await
        .unwrap();

    assert_eq!(exported.path, out_dir.join("Devis-DEV-20261018-042.pdf"));
    assert!(exported.path.starts_with(dir.path().join("output/2026/mairie-de-lyon")));
    assert_eq!(exported.pages, 1);

    let bytes = std::fs::read(&exported.path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(count(&bytes, b"/Helvetica") >= 1);
}

#[tokio::test]
async fn long_quote_paginates() {
    let dir = tempfile::tempdir().unwrap();
    let editor = catering_quote(120);

    let exported = Exporter::new()
        .export(editor.document(), &ExportOptions::new(dir.path()))
        .await
        .unwrap();
    assert!(exported.pages >= 3, "{} pages", exported.pages);
}

#[tokio::test]
async fn saved_quote_file_exports_like_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let quote_path = dir.path().join("quotes/dev.toml");
    let doc = catering_quote(2).into_document();
    save_quote(&quote_path, &doc).unwrap();

    let reloaded = load_quote(&quote_path).unwrap();
    assert_eq!(reloaded, doc);

    let exported = Exporter::new()
        .export(&reloaded, &ExportOptions::new(dir.path().join("pdf")))
        .await
        .unwrap();
    assert!(exported.path.exists());
}

#[tokio::test]
async fn quote_without_client_is_refused_and_nothing_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = catering_quote(0);
    editor.set_client(ClientField::Name, "  ");

    let err = Exporter::new()
        .export(editor.document(), &ExportOptions::new(dir.path().join("out")))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Veuillez remplir au moins le nom du client.");
    assert!(matches!(err, ExportError::Validation(_)));
    assert!(!dir.path().join("out").exists());
}
