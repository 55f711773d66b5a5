use actionweb::config::AppConfig;
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: actionweb-routes <config-file>");
        eprintln!("\nExample:");
        eprintln!("  actionweb-routes actionweb.yaml");
        process::exit(1);
    }

    let config_path = &args[1];

    println!("Checking route table in: {}", config_path);
    println!("{}", "=".repeat(60));

    let config = match AppConfig::from_yaml_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Configuration could not be loaded!\n");
            eprintln!("Error: {:#}", e);
            if e.to_string().contains("parse") {
                eprintln!("\nHint: Check for YAML syntax errors:");
                eprintln!("  - Proper indentation (use spaces, not tabs)");
                eprintln!("  - Route patterns containing braces must be valid YAML scalars");
            }
            process::exit(1);
        }
    };

    let routes = config.route_config();

    println!("Summary:");
    println!("  - Declared routes: {}", config.routes.len());
    println!("  - Valid routes: {}", routes.len());
    println!("  - Root controller: {}", config.controllers.root_controller);

    if !routes.is_empty() {
        println!("\nRoutes (first match wins):");
        for (index, spec) in routes.specs().iter().enumerate() {
            println!("  {:>3}. {}", index + 1, spec);
        }
    }

    let shadowed = routes.shadowed();
    if !shadowed.is_empty() {
        println!("\n⚠ Warnings:");
        for (earlier, later) in shadowed {
            println!(
                "  - Route '{}' is unreachable: '{}' is declared first and matches the same requests",
                routes.specs()[later],
                routes.specs()[earlier]
            );
        }
    }

    if !routes.conflicts().is_empty() {
        eprintln!("\n✗ Route conflicts:");
        for conflict in routes.conflicts() {
            eprintln!("  - {}", conflict);
        }
        eprintln!("\n{}", "=".repeat(60));
        process::exit(1);
    }

    if let Err(e) = config.validate() {
        eprintln!("\n✗ Configuration is invalid: {:#}", e);
        process::exit(1);
    }

    println!("\n{}", "=".repeat(60));
    println!("Route table is valid!");
}
