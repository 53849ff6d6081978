use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Database file location, overridable for deployments that keep the
/// data directory elsewhere.
pub fn db_path() -> String {
    std::env::var("MINERVA_DB_PATH").unwrap_or_else(|_| "website/db/minerva.db".to_string())
}

pub fn init_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    let manager = SqliteConnectionManager::file(db_path());
    let pool = Pool::builder().max_size(10).build(manager)?;

    // Enable WAL mode for better concurrent read performance
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Agency accounts
        CREATE TABLE IF NOT EXISTS agencies (
            id INTEGER PRIMARY KEY,
            agency_name TEXT NOT NULL,
            contact_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            website TEXT,
            location TEXT,
            description TEXT,
            skills TEXT,
            platforms TEXT,
            verticals TEXT,
            certifications TEXT,
            logo_url TEXT,
            subscription_tier TEXT NOT NULL DEFAULT 'free'
                CHECK(subscription_tier IN ('free', 'pro', 'premium')),
            subscription_status TEXT NOT NULL DEFAULT 'active'
                CHECK(subscription_status IN ('active', 'past_due', 'canceled')),
            subscription_expires_at DATETIME,
            rating_average REAL NOT NULL DEFAULT 0,
            rating_count INTEGER NOT NULL DEFAULT 0,
            badges TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK(status IN ('pending', 'approved', 'rejected', 'banned')),
            projects_created_this_month INTEGER NOT NULL DEFAULT 0,
            responses_sent_this_month INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Subscription plans (admin-editable)
        CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            max_projects INTEGER NOT NULL DEFAULT 5,
            max_responses INTEGER NOT NULL DEFAULT 10,
            max_collabs INTEGER NOT NULL DEFAULT 3,
            max_messages INTEGER NOT NULL DEFAULT 50,
            highlight_label TEXT,
            highlight_badge_color TEXT,
            price REAL NOT NULL DEFAULT 0,
            description TEXT,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Per-agency limit overrides, layered on top of a plan
        CREATE TABLE IF NOT EXISTS user_overrides (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            override_plan_id INTEGER,
            custom_max_projects INTEGER,
            custom_max_responses INTEGER,
            custom_max_messages INTEGER,
            custom_max_collabs INTEGER,
            custom_badge_label TEXT,
            custom_badge_color TEXT,
            admin_notes TEXT,
            expiration_date DATETIME,
            is_permanent INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES agencies(id) ON DELETE CASCADE,
            FOREIGN KEY (override_plan_id) REFERENCES plans(id) ON DELETE SET NULL
        );

        -- Project postings
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY,
            agency_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            project_type TEXT NOT NULL DEFAULT 'collaboration'
                CHECK(project_type IN ('collaboration', 'overflow', 'shared_account', 'joint_venture', 'other')),
            platforms_involved TEXT,
            budget_range TEXT,
            deadline DATE,
            hide_identity INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open', 'closed')),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (agency_id) REFERENCES agencies(id) ON DELETE CASCADE
        );

        -- Owner consent to show their identity to a specific responder
        CREATE TABLE IF NOT EXISTS project_identity_reveals (
            id INTEGER PRIMARY KEY,
            project_id INTEGER NOT NULL,
            responder_agency_id INTEGER NOT NULL,
            revealed INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(project_id, responder_agency_id),
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            FOREIGN KEY (responder_agency_id) REFERENCES agencies(id) ON DELETE CASCADE
        );

        -- Responses to project postings
        CREATE TABLE IF NOT EXISTS responses (
            id INTEGER PRIMARY KEY,
            project_id INTEGER NOT NULL,
            responder_agency_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            contact_email TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            FOREIGN KEY (responder_agency_id) REFERENCES agencies(id) ON DELETE CASCADE
        );

        -- Agency-to-agency reviews
        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY,
            reviewer_agency_id INTEGER NOT NULL,
            target_agency_id INTEGER NOT NULL,
            project_id INTEGER,
            rating INTEGER NOT NULL CHECK(rating >= 1 AND rating <= 5),
            comment TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(reviewer_agency_id, target_agency_id, project_id),
            FOREIGN KEY (reviewer_agency_id) REFERENCES agencies(id) ON DELETE CASCADE,
            FOREIGN KEY (target_agency_id) REFERENCES agencies(id) ON DELETE CASCADE,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE SET NULL
        );

        -- Support tickets
        CREATE TABLE IF NOT EXISTS tickets (
            id INTEGER PRIMARY KEY,
            agency_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open'
                CHECK(status IN ('open', 'in_progress', 'resolved', 'closed')),
            message TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (agency_id) REFERENCES agencies(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS ticket_responses (
            id INTEGER PRIMARY KEY,
            ticket_id INTEGER NOT NULL,
            user_type TEXT NOT NULL CHECK(user_type IN ('agency', 'admin')),
            user_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE
        );

        -- Internal inbox (sender_id 0 = system/admin)
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY,
            sender_id INTEGER NOT NULL DEFAULT 0,
            recipient_id INTEGER NOT NULL,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (recipient_id) REFERENCES agencies(id) ON DELETE CASCADE
        );

        -- Public contact form submissions
        CREATE TABLE IF NOT EXISTS contact_messages (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            subject TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Back-office accounts
        CREATE TABLE IF NOT EXISTS admin_users (
            id INTEGER PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Activity trail
        CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            action TEXT NOT NULL,
            metadata_json TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES agencies(id) ON DELETE SET NULL
        );

        -- Server-side sessions (agency and admin)
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_type TEXT NOT NULL CHECK(user_type IN ('agency', 'admin')),
            user_id INTEGER NOT NULL,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            ip_hash TEXT
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_agencies_email ON agencies(email);
        CREATE INDEX IF NOT EXISTS idx_agencies_status ON agencies(status);
        CREATE INDEX IF NOT EXISTS idx_projects_agency_id ON projects(agency_id);
        CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
        CREATE INDEX IF NOT EXISTS idx_responses_project_id ON responses(project_id);
        CREATE INDEX IF NOT EXISTS idx_reviews_target_agency_id ON reviews(target_agency_id);
        CREATE INDEX IF NOT EXISTS idx_tickets_agency_id ON tickets(agency_id);
        CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
        CREATE INDEX IF NOT EXISTS idx_reveals_project_id ON project_identity_reveals(project_id);
        CREATE INDEX IF NOT EXISTS idx_ticket_responses_ticket_id ON ticket_responses(ticket_id);
        CREATE INDEX IF NOT EXISTS idx_overrides_user_id ON user_overrides(user_id);
        CREATE INDEX IF NOT EXISTS idx_messages_recipient_id ON messages(recipient_id);
        CREATE INDEX IF NOT EXISTS idx_messages_is_read ON messages(is_read);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        ("site_name", "Minerva Metrics Hub"),
        ("site_url", "http://localhost:8000"),
        ("session_expiry_hours", "168"),
        ("login_rate_limit", "5"),
        ("reviews_per_profile", "10"),
        ("activity_feed_size", "20"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    // Seed the three stock plans
    let plans: Vec<(&str, i64, i64, i64, i64, Option<&str>, Option<&str>, f64, &str, i64)> = vec![
        (
            "Free", 2, 5, 1, 20, None, None, 0.0,
            "Perfect for getting started with the Minerva Hub community", 1,
        ),
        (
            "Pro", 10, 30, 5, 100, Some("Pro Member"), Some("#8b5cf6"), 49.0,
            "For growing agencies looking to expand their network", 0,
        ),
        (
            "Premium", -1, -1, -1, -1, Some("Premium Partner"), Some("#f59e0b"), 149.0,
            "Unlimited access for established agencies", 0,
        ),
    ];

    for (name, projects, responses, collabs, messages, label, color, price, desc, is_default) in plans {
        conn.execute(
            "INSERT OR IGNORE INTO plans
             (name, max_projects, max_responses, max_collabs, max_messages,
              highlight_label, highlight_badge_color, price, description, is_default, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
            params![name, projects, responses, collabs, messages, label, color, price, desc, is_default],
        )?;
    }

    // Seed an admin account if none exists
    let admin_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM admin_users", [], |row| row.get(0))?;

    if admin_count == 0 {
        // Default password: "admin123" — change after first login
        let hash = bcrypt::hash("admin123", bcrypt::DEFAULT_COST)
            .map_err(|e| format!("failed to hash default admin password: {}", e))?;
        conn.execute(
            "INSERT INTO admin_users (email, password_hash) VALUES (?1, ?2)",
            params!["admin@minerva.com", hash],
        )?;
    }

    Ok(())
}
