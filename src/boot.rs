use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

/// Required directories that will be created if missing
const REQUIRED_DIRS: &[&str] = &[
    "website",
    "website/db",
    "website/static",
    "website/static/css",
    "website/static/js",
    "website/static/img",
    "website/templates",
    "website/templates/pages",
    "website/templates/admin",
];

/// Critical template files — the server cannot render without these
const CRITICAL_TEMPLATES: &[&str] = &[
    "website/templates/pages/home.html.tera",
    "website/templates/pages/login.html.tera",
    "website/templates/pages/register.html.tera",
    "website/templates/pages/projects.html.tera",
    "website/templates/admin/login.html.tera",
    "website/templates/admin/dashboard.html.tera",
];

/// Run all boot checks. Call this before Rocket launches.
/// Creates missing directories and aborts if critical templates are absent.
pub fn run() {
    info!("Minerva Hub boot check starting...");

    let mut errors = 0u32;

    for dir in REQUIRED_DIRS {
        let path = Path::new(dir);
        if !path.exists() {
            match fs::create_dir_all(path) {
                Ok(_) => info!("  Created directory: {}", dir),
                Err(e) => {
                    error!("  FAILED to create directory {}: {}", dir, e);
                    errors += 1;
                }
            }
        }
    }

    for file in CRITICAL_TEMPLATES {
        if !Path::new(file).exists() {
            error!("  MISSING critical template: {}", file);
            errors += 1;
        }
    }

    if !Path::new("website/static/img/placeholder-logo.png").exists() {
        warn!("  Missing placeholder logo; hidden-identity listings will show a broken image");
    }

    if errors > 0 {
        error!("Boot check failed with {} error(s). Refusing to start.", errors);
        process::exit(1);
    }

    info!("Boot check passed.");
}
