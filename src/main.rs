use clap::{Arg, Command};
use log::LevelFilter;
use mailreport::config::{ReportAction, Settings, Transport};
use mailreport::message::Message;
use mailreport::simulation;
use std::process;

fn main() {
    let matches = Command::new("mailreport")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Report dispatch engine for phishing and spam reporting from a mail client")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file path")
                .default_value("mailreport.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default settings file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the settings file")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("FILE")
                .help("Classify an email file and show its delivery plan without sending")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_settings(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let settings = match load_settings(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {e}");
            process::exit(1);
        }
    };

    if let Some(email_file) = matches.get_one::<String>("test-email") {
        test_email_file(&settings, email_file);
        return;
    }

    if matches.get_flag("test-config") {
        test_settings(&settings);
        return;
    }

    println!("Nothing to do. Use --generate-config, --test-config or --test-email.");
}

fn load_settings(path: &str) -> anyhow::Result<Settings> {
    if std::path::Path::new(path).exists() {
        Settings::from_file(path)
    } else {
        log::warn!("Settings file '{path}' not found, using defaults");
        Ok(Settings::default())
    }
}

fn generate_default_settings(path: &str) {
    let settings = Settings::default();
    match settings.to_file(path) {
        Ok(()) => {
            println!("Default settings written to: {path}");
            println!("Please edit the settings file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing settings file: {e}");
            process::exit(1);
        }
    }
}

fn test_settings(settings: &Settings) {
    println!("🔍 Testing settings...");
    println!("   Report action: {}", settings.report_action);
    println!("   Phishing transport: {}", settings.phishing_transport);
    println!("   Simulation transport: {}", settings.simulation_transport);
    if settings.phishing_transport.uses_smtp() || settings.simulation_transport.uses_smtp() {
        println!("   SMTP report recipient: {}", settings.smtp_to);
    }
    if settings.phishing_transport.uses_http() || settings.simulation_transport.uses_http() {
        if let Ok(url) = settings.report_url() {
            println!("   Report endpoint: {}", url);
        }
    }
    match settings.validate() {
        Ok(()) => println!("✅ Settings are valid"),
        Err(e) => {
            println!("❌ Settings validation failed: {e}");
            process::exit(1);
        }
    }
}

fn test_email_file(settings: &Settings, email_file: &str) {
    println!("🧪 Testing email file: {}", email_file);
    println!();

    let content = match std::fs::read_to_string(email_file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("❌ Error reading email file: {e}");
            process::exit(1);
        }
    };
    let message = Message::from_raw_email(&content);

    println!("📧 Email details:");
    println!("   From: {}", message.from);
    println!("   To: {}", message.to);
    println!("   Subject: {}", message.subject);
    println!("   Headers: {}", message.headers.len());
    println!();

    let is_simulation = simulation::belongs_to_simulation(&message.headers);
    let scenario = simulation::scenario_id(&message.headers);
    let victim_urls = simulation::reporting_urls(&message.headers);

    println!("🔎 Classification:");
    println!(
        "   Simulation: {}",
        if is_simulation { "yes" } else { "no" }
    );
    println!(
        "   Scenario id: {}",
        scenario.as_deref().unwrap_or("(none)")
    );
    if victim_urls.is_empty() {
        println!("   Victim report URLs: (none)");
    } else {
        for url in &victim_urls {
            println!("   Victim report URL: {}", url);
        }
    }
    println!();

    let transport = if is_simulation {
        settings.simulation_transport
    } else {
        settings.phishing_transport
    };
    println!("📤 Fraud report plan:");
    println!("   Transport: {}", transport);
    if transport.uses_http() {
        match settings.report_url() {
            Ok(base) => {
                let urls = if is_simulation && !victim_urls.is_empty() {
                    victim_urls.clone()
                } else {
                    vec![base]
                };
                for url in &urls {
                    println!("   POST {}", url);
                }
            }
            Err(e) => println!("   ❌ {e}"),
        }
    }
    if transport.uses_smtp() {
        println!(
            "   SMTP to {} with subject \"{}\"",
            settings.smtp_to,
            fraud_subject(settings, &message.subject)
        );
    }
    println!(
        "   Then move message to: {} (deferred)",
        settings.report_action
    );
    println!();

    println!("📤 Spam report plan:");
    if is_simulation {
        println!("   Delegates to the fraud flow (simulation detected)");
        if settings.report_action == ReportAction::Keep {
            println!("   Forces an immediate junk move despite the keep policy");
        }
    } else if settings.phishing_transport == Transport::Http {
        println!("   ❌ Unsupported: spam reports require an SMTP transport");
    } else {
        let subject = if settings.use_expressive_subject {
            format!("Spam Report: {}", message.subject)
        } else {
            "Spam Report".to_string()
        };
        println!(
            "   SMTP to {} with subject \"{}\"",
            settings.smtp_to, subject
        );
        println!("   Then move message to junk immediately");
    }
}

fn fraud_subject(settings: &Settings, original: &str) -> String {
    if settings.use_expressive_subject {
        format!("Phishing Report: {}", original)
    } else {
        "Phishing Report".to_string()
    }
}
