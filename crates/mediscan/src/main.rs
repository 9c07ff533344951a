//! `mediscan` - CLI for the mediscan record store
//!
//! This binary provides the command-line interface for logging in, managing
//! accounts and patients, uploading and reviewing scans, and exporting reports.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

use mediscan::cli::{
    AccountCommand, Cli, Command, ConfigCommand, LoginCommand, OutputFormat, PatientAddCommand,
    PatientCommand, ReportCommand, ScanAddCommand, ScanCommand,
};
use mediscan::validation::{require_non_empty, validate_new_password};
use mediscan::{
    init_logging, Admin, AdminPatch, Config, Error, NewPatient, NewScan, Patient, PatientPatch,
    RecordStore, Role, Scan, ScanReport, Session,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let format = cli.format;
    let config_path = cli.config;
    let app = || App::open(config_path.clone());

    // Execute the command
    match cli.command {
        Command::Config(config_cmd) => handle_config(config_path.clone(), format, config_cmd),
        Command::Login(login_cmd) => handle_login(&app()?.store, format, &login_cmd),
        Command::Logout => {
            app()?.store.clear_current_user()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => handle_whoami(&app()?.store, format),
        Command::Account(account_cmd) => {
            let app = app()?;
            handle_account(&app.store, &app.config, format, account_cmd)
        }
        Command::Patient(patient_cmd) => handle_patient(&app()?.store, format, patient_cmd),
        Command::Scan(scan_cmd) => handle_scan(&app()?.store, format, scan_cmd),
        Command::Report(report_cmd) => {
            let app = app()?;
            handle_report(&app.store, &app.config, format, report_cmd)
        }
        Command::Reset { yes } => handle_reset(&app()?.store, yes),
    }
}

/// Loaded configuration and the store it points at.
#[derive(Debug)]
struct App {
    config: Config,
    store: RecordStore,
}

impl App {
    fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load_from(config_path).context("failed to load configuration")?;
        let path = config.database_path();
        let store = RecordStore::open(&path)
            .with_context(|| format!("failed to open record store at {}", path.display()))?;
        if config.accounts.seed_default_accounts {
            store.ensure_default_accounts()?;
        }
        Ok(Self { config, store })
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

// Login / session

fn handle_login(store: &RecordStore, format: OutputFormat, cmd: &LoginCommand) -> Result<()> {
    require_non_empty("username", &cmd.username)?;
    require_non_empty("password", &cmd.password)?;

    let admin = store.authenticate(&cmd.username, &cmd.password)?;
    let session = Session::for_account(&admin);
    store.set_current_user(&session)?;

    match format {
        OutputFormat::Json => print_json(&session),
        OutputFormat::Plain => {
            println!("Logged in as {} ({}).", session.username, session.role);
            Ok(())
        }
    }
}

fn handle_whoami(store: &RecordStore, format: OutputFormat) -> Result<()> {
    let session = store.current_user()?;
    match format {
        OutputFormat::Json => print_json(&session),
        OutputFormat::Plain => {
            match session {
                Some(session) => println!("{} ({}) [{}]", session.username, session.role, session.id),
                None => println!("Not logged in."),
            }
            Ok(())
        }
    }
}

// Accounts

/// Account as shown to users; the password digest is never printed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountView<'a> {
    id: &'a str,
    username: &'a str,
    role: Role,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by: Option<&'a str>,
}

impl<'a> From<&'a Admin> for AccountView<'a> {
    fn from(admin: &'a Admin) -> Self {
        Self {
            id: &admin.id,
            username: &admin.username,
            role: admin.role,
            created_at: admin.created_at,
            created_by: admin.created_by.as_deref(),
        }
    }
}

fn print_account(format: OutputFormat, admin: &Admin) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&AccountView::from(admin)),
        OutputFormat::Plain => {
            println!("{} ({}) [{}]", admin.username, admin.role, admin.id);
            Ok(())
        }
    }
}

fn handle_account(
    store: &RecordStore,
    config: &Config,
    format: OutputFormat,
    cmd: AccountCommand,
) -> Result<()> {
    let session = if matches!(cmd, AccountCommand::Passwd { .. }) {
        store.require_session()?
    } else {
        store.require_role(Role::Admin)?
    };

    match cmd {
        AccountCommand::List => {
            let admins = store.list_admins()?;
            match format {
                OutputFormat::Json => {
                    let views: Vec<AccountView<'_>> = admins.iter().map(AccountView::from).collect();
                    print_json(&views)?;
                }
                OutputFormat::Plain => {
                    println!(
                        "{:<22} {:<16} {:<8} {:<17} CREATED BY",
                        "ID", "USERNAME", "ROLE", "CREATED"
                    );
                    for admin in &admins {
                        println!(
                            "{:<22} {:<16} {:<8} {:<17} {}",
                            admin.id,
                            admin.username,
                            admin.role,
                            format_time(&admin.created_at),
                            admin.created_by.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        }
        AccountCommand::Add {
            username,
            password,
            role,
        } => {
            require_non_empty("username", &username)?;
            require_non_empty("password", &password)?;
            let admin = store.create_admin(
                &username,
                &password,
                role.into(),
                Some(session.username.as_str()),
            )?;
            print_account(format, &admin)?;
        }
        AccountCommand::Edit {
            id,
            username,
            role,
            password,
        } => {
            if let Some(username) = &username {
                require_non_empty("username", username)?;
            }
            if let Some(password) = &password {
                require_non_empty("password", password)?;
            }
            let patch = AdminPatch {
                username,
                password,
                role: role.map(Into::into),
            };
            let admin = store
                .update_admin(&id, patch)?
                .ok_or_else(|| Error::not_found("account", id.as_str()))?;

            // Keep the session in step when the admin edits their own account.
            if admin.id == session.id {
                store.set_current_user(&Session::for_account(&admin))?;
            }
            print_account(format, &admin)?;
        }
        AccountCommand::Delete { id } => {
            store.remove_account(&session, &id)?;
            println!("Deleted account {id}.");
        }
        AccountCommand::Passwd { current, new } => {
            validate_new_password(&current, &new, config.accounts.min_password_length)?;
            if !store.change_password(&session.id, &current, &new)? {
                bail!("current password is incorrect");
            }
            println!("Password changed.");
        }
    }
    Ok(())
}

// Patients

fn print_patient_table(patients: &[Patient]) {
    println!(
        "{:<18} {:<9} {:<24} {:>4} {:<18} REGISTERED",
        "ID", "CODE", "NAME", "AGE", "CONTACT"
    );
    for patient in patients {
        println!(
            "{:<18} {:<9} {:<24} {:>4} {:<18} {}",
            patient.id,
            patient.patient_code,
            patient.name,
            patient.age,
            patient.contact_number,
            format_time(&patient.created_at)
        );
    }
}

fn print_patient(patient: &Patient) {
    println!("Patient {}", patient.patient_code);
    println!("  Id:          {}", patient.id);
    println!("  Name:        {}", patient.name);
    println!("  Age:         {}", patient.age);
    println!("  Contact:     {}", patient.contact_number);
    if let Some(gender) = patient.gender {
        println!("  Gender:      {gender}");
    }
    if let Some(notes) = &patient.notes {
        println!("  Notes:       {notes}");
    }
    println!("  Registered:  {}", format_time(&patient.created_at));
}

fn handle_patient(store: &RecordStore, format: OutputFormat, cmd: PatientCommand) -> Result<()> {
    store.require_session()?;

    match cmd {
        PatientCommand::List { search } => {
            let patients = match search.as_deref() {
                Some(term) => store.search_patients(term)?,
                None => store.list_patients()?,
            };
            match format {
                OutputFormat::Json => print_json(&patients)?,
                OutputFormat::Plain => print_patient_table(&patients),
            }
        }
        PatientCommand::Add(add_cmd) => {
            let patient = add_patient(store, add_cmd)?;
            match format {
                OutputFormat::Json => print_json(&patient)?,
                OutputFormat::Plain => print_patient(&patient),
            }
        }
        PatientCommand::Show { id } => {
            let patient = store
                .find_patient(&id)?
                .ok_or_else(|| Error::not_found("patient", id.as_str()))?;
            let scans = store.scans_for_patient(&patient.id)?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "patient": patient,
                    "scans": scans,
                }))?,
                OutputFormat::Plain => {
                    print_patient(&patient);
                    println!();
                    print_scan_table(&scans);
                }
            }
        }
        PatientCommand::Edit {
            id,
            name,
            age,
            contact,
            code,
            gender,
            clear_gender,
            notes,
            clear_notes,
        } => {
            let fields = [
                ("name", &name),
                ("contact number", &contact),
                ("patient code", &code),
            ];
            for (field, value) in fields {
                if let Some(value) = value {
                    require_non_empty(field, value)?;
                }
            }
            let patch = PatientPatch {
                name,
                age,
                patient_code: code,
                contact_number: contact,
                gender: if clear_gender {
                    Some(None)
                } else {
                    gender.map(|g| Some(g.into()))
                },
                notes: if clear_notes { Some(None) } else { notes.map(Some) },
            };
            let patient = store
                .update_patient(&id, patch)?
                .ok_or_else(|| Error::not_found("patient", id.as_str()))?;
            match format {
                OutputFormat::Json => print_json(&patient)?,
                OutputFormat::Plain => print_patient(&patient),
            }
        }
    }
    Ok(())
}

fn add_patient(store: &RecordStore, cmd: PatientAddCommand) -> Result<Patient> {
    require_non_empty("name", &cmd.name)?;
    require_non_empty("contact number", &cmd.contact)?;

    let code = match cmd.code {
        Some(code) => {
            require_non_empty("patient code", &code)?;
            code
        }
        None => store.next_patient_code()?,
    };

    let mut new = NewPatient::new(cmd.name, cmd.age, code, cmd.contact);
    if let Some(gender) = cmd.gender {
        new = new.with_gender(gender.into());
    }
    if let Some(notes) = cmd.notes {
        new = new.with_notes(notes);
    }
    Ok(store.create_patient(new)?)
}

// Scans

fn print_scan_table(scans: &[Scan]) {
    println!(
        "{:<19} {:<24} {:<6} {:<19} {:<17} REVIEWED BY",
        "ID", "PATIENT", "TYPE", "STATUS", "UPLOADED"
    );
    for scan in scans {
        println!(
            "{:<19} {:<24} {:<6} {:<19} {:<17} {}",
            scan.id,
            scan.patient_name,
            scan.scan_type,
            scan.status,
            format_time(&scan.uploaded_at),
            scan.reviewed_by.as_deref().unwrap_or("-")
        );
    }
}

fn print_scan(scan: &Scan) {
    println!("Scan {}", scan.id);
    println!("  Patient:     {} [{}]", scan.patient_name, scan.patient_id);
    println!("  Type:        {}", scan.scan_type);
    println!("  Status:      {}", scan.status);
    println!("  Uploaded:    {}", format_time(&scan.uploaded_at));
    println!("  Image:       {} bytes", scan.image_data.len());
    if let Some(reviewer) = &scan.reviewed_by {
        println!("  Reviewed by: {reviewer}");
    }
    if let Some(reviewed_at) = &scan.reviewed_at {
        println!("  Reviewed at: {}", format_time(reviewed_at));
    }
    if let Some(notes) = &scan.notes {
        println!("  Notes:       {notes}");
    }
}

fn print_scan_result(format: OutputFormat, scan: &Scan) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(scan),
        OutputFormat::Plain => {
            print_scan(scan);
            Ok(())
        }
    }
}

fn handle_scan(store: &RecordStore, format: OutputFormat, cmd: ScanCommand) -> Result<()> {
    let session = store.require_session()?;

    match cmd {
        ScanCommand::List {
            search,
            status,
            patient,
        } => {
            let mut scans =
                store.filter_scans(search.as_deref().unwrap_or_default(), status.map(Into::into))?;
            if let Some(patient_id) = patient {
                scans.retain(|s| s.patient_id == patient_id);
            }
            match format {
                OutputFormat::Json => print_json(&scans)?,
                OutputFormat::Plain => print_scan_table(&scans),
            }
        }
        ScanCommand::Add(add_cmd) => {
            let scan = add_scan(store, add_cmd)?;
            print_scan_result(format, &scan)?;
        }
        ScanCommand::Show { id } => {
            let scan = store
                .find_scan(&id)?
                .ok_or_else(|| Error::not_found("scan", id.as_str()))?;
            print_scan_result(format, &scan)?;
        }
        ScanCommand::Review { id, status, notes } => {
            let scan = store.submit_review(&session, &id, status.into(), notes)?;
            print_scan_result(format, &scan)?;
        }
        ScanCommand::SetStatus { id, status } => {
            let scan = store
                .set_scan_status(&id, status.into())?
                .ok_or_else(|| Error::not_found("scan", id.as_str()))?;
            print_scan_result(format, &scan)?;
        }
    }
    Ok(())
}

fn add_scan(store: &RecordStore, cmd: ScanAddCommand) -> Result<Scan> {
    let patient = store
        .find_patient(&cmd.patient)?
        .ok_or_else(|| Error::not_found("patient", cmd.patient.as_str()))?;

    let image_data = match (cmd.image_data, cmd.image_file) {
        (Some(data), _) => data,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read image payload from {}", path.display()))?
            .trim_end()
            .to_string(),
        (None, None) => String::new(),
    };
    require_non_empty("image data", &image_data)?;

    let new = NewScan::for_patient(&patient, cmd.scan_type.into(), image_data);
    Ok(store.create_scan(new)?)
}

// Reports

fn print_report(report: &ScanReport) {
    println!("Scan Report");
    println!("===========");
    println!("Generated:        {}", format_time(&report.generated_at));
    println!("Total scans:      {}", report.total_scans);
    println!("Completed:        {}", report.completed_scans);
    println!("Pending:          {}", report.pending_scans);
    println!("Follow-up:        {}", report.follow_up_scans);
    println!();
    print_scan_table(&report.scans);
}

fn handle_report(
    store: &RecordStore,
    config: &Config,
    format: OutputFormat,
    cmd: ReportCommand,
) -> Result<()> {
    store.require_session()?;

    match cmd {
        ReportCommand::Stats => {
            let stats = store.dashboard_stats()?;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Plain => {
                    println!("Total patients:   {}", stats.total_patients);
                    println!("Total scans:      {}", stats.total_scans);
                    println!("Pending review:   {}", stats.pending_scans);
                    println!("Reviewed:         {}", stats.reviewed_scans);

                    let storage = store.storage().stats()?;
                    println!();
                    println!("Database:         {}", store.storage().path().display());
                    println!("Stored keys:      {}", storage.present_keys);
                    println!("Stored bytes:     {}", storage.stored_bytes);
                    println!("File size:        {}", storage.db_size_bytes);
                }
            }
        }
        ReportCommand::Show { patient } => {
            let report = store.scan_report(patient.as_deref())?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Plain => print_report(&report),
            }
        }
        ReportCommand::Export { patient, output } => {
            let report = store.scan_report(patient.as_deref())?;
            let written = match output {
                Some(path) => report
                    .export(&path)
                    .with_context(|| format!("failed to export report to {}", path.display()))?,
                None => {
                    let dir = config.export_dir();
                    report
                        .export_into(&dir)
                        .with_context(|| format!("failed to export report to {}", dir.display()))?
                }
            };
            println!("Report written to {}", written.display());
        }
    }
    Ok(())
}

// Reset

fn handle_reset(store: &RecordStore, yes: bool) -> Result<()> {
    store.require_role(Role::Admin)?;

    if !yes {
        println!("This will erase all accounts, patients and scans, and log you out.");
        println!("Use --yes to confirm.");
        return Ok(());
    }

    store.reset_all()?;
    println!("All records reset. Log in again with the default accounts.");
    Ok(())
}

// Configuration

fn handle_config(
    config_path: Option<PathBuf>,
    format: OutputFormat,
    cmd: ConfigCommand,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path).context("failed to load configuration")?;
            if json || format == OutputFormat::Json {
                print_json(&config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:        {}", config.database_path().display());
                println!();
                println!("[Accounts]");
                println!(
                    "  Seed default accounts: {}",
                    config.accounts.seed_default_accounts
                );
                println!(
                    "  Min password length:  {}",
                    config.accounts.min_password_length
                );
                println!();
                println!("[Reports]");
                println!("  Export directory:     {}", config.export_dir().display());
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            if !path.exists() {
                println!("File not found; defaults apply.");
            }
            Config::load_from(Some(path.clone()))
                .with_context(|| format!("{} is not a valid configuration", path.display()))?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
