/// DDL for the `haven` schema. Statements are idempotent so workers can run
/// them at startup; ordering matters because of foreign keys.
pub const SCHEMA_DDL: &str = r#"
CREATE SCHEMA IF NOT EXISTS haven;
"#;

pub const PROPERTIES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS haven.properties (
    id BIGSERIAL PRIMARY KEY,
    organization_id BIGINT NOT NULL,
    address TEXT NOT NULL,
    unit_number VARCHAR(50),
    city VARCHAR(100) NOT NULL,
    state VARCHAR(10) NOT NULL,
    zip_code VARCHAR(20) NOT NULL,
    status VARCHAR(20),
    tenant_name TEXT,
    rent_amount DOUBLE PRECISION,
    housing_authority_id BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_property_status CHECK (
        status IS NULL OR status IN ('vacant', 'occupied', 'maintenance', 'offline')
    )
);

CREATE INDEX IF NOT EXISTS idx_properties_org ON haven.properties(organization_id);
"#;

pub const EMAILS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS haven.emails (
    id BIGSERIAL PRIMARY KEY,
    organization_id BIGINT NOT NULL,
    email_account_id BIGINT NOT NULL,
    message_id VARCHAR(255) NOT NULL,
    thread_id VARCHAR(255),
    subject TEXT NOT NULL DEFAULT '',
    subject_hash VARCHAR(16),
    sender_email TEXT NOT NULL DEFAULT '',
    sender_name TEXT,
    body_preview TEXT,
    received_at TIMESTAMPTZ,

    category VARCHAR(40),
    priority_level VARCHAR(10) NOT NULL DEFAULT 'normal',
    confidence_score DOUBLE PRECISION,
    extracted_data JSONB,
    requires_action BOOLEAN NOT NULL DEFAULT false,
    is_read BOOLEAN NOT NULL DEFAULT false,
    is_important BOOLEAN NOT NULL DEFAULT false,
    property_id BIGINT REFERENCES haven.properties(id),

    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_emails_org_message UNIQUE (organization_id, message_id),
    CONSTRAINT chk_email_priority CHECK (
        priority_level IN ('low', 'normal', 'high', 'urgent')
    ),
    CONSTRAINT chk_email_confidence CHECK (
        confidence_score IS NULL OR (confidence_score >= 0 AND confidence_score <= 1)
    )
);

CREATE INDEX IF NOT EXISTS idx_emails_unclassified
    ON haven.emails(organization_id, received_at)
    WHERE category IS NULL;
CREATE INDEX IF NOT EXISTS idx_emails_subject_hash ON haven.emails(subject_hash, received_at);
"#;

pub const TASKS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS haven.tasks (
    id BIGSERIAL PRIMARY KEY,
    organization_id BIGINT NOT NULL,
    email_id BIGINT REFERENCES haven.emails(id) ON DELETE SET NULL,
    property_id BIGINT REFERENCES haven.properties(id),
    housing_authority_id BIGINT REFERENCES haven.housing_authorities(id),
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    task_type VARCHAR(40) NOT NULL,
    inspection_type VARCHAR(40),
    utility_company VARCHAR(40),
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    priority VARCHAR(10) NOT NULL DEFAULT 'normal',
    due_date DATE NOT NULL,
    confidence DOUBLE PRECISION,
    source VARCHAR(20) NOT NULL DEFAULT 'manual',
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_task_status CHECK (
        status IN ('pending', 'in_progress', 'completed', 'cancelled')
    ),
    CONSTRAINT chk_task_source CHECK (
        source IN ('manual', 'rule_engine', 'ai_analysis')
    )
);

CREATE INDEX IF NOT EXISTS idx_tasks_org_status ON haven.tasks(organization_id, status, due_date);
CREATE INDEX IF NOT EXISTS idx_tasks_email ON haven.tasks(email_id) WHERE email_id IS NOT NULL;
"#;

pub const AI_ANALYSIS_LOGS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS haven.ai_analysis_logs (
    id BIGSERIAL PRIMARY KEY,
    email_id BIGINT NOT NULL REFERENCES haven.emails(id) ON DELETE CASCADE,
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    model VARCHAR(60),
    overall_confidence DOUBLE PRECISION,
    result JSONB,
    error TEXT,
    estimated_cost_usd DOUBLE PRECISION,
    user_feedback VARCHAR(20),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_log_status CHECK (
        status IN ('pending', 'processing', 'completed', 'failed')
    ),
    CONSTRAINT chk_log_feedback CHECK (
        user_feedback IS NULL OR user_feedback IN ('correct', 'incorrect')
    )
);

CREATE INDEX IF NOT EXISTS idx_analysis_logs_email ON haven.ai_analysis_logs(email_id, created_at);
CREATE INDEX IF NOT EXISTS idx_analysis_logs_processing
    ON haven.ai_analysis_logs(started_at)
    WHERE status = 'processing';
"#;

pub const HOUSING_AUTHORITIES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS haven.housing_authorities (
    id BIGSERIAL PRIMARY KEY,
    organization_id BIGINT NOT NULL,
    authority_type VARCHAR(20) NOT NULL,
    display_name TEXT NOT NULL,
    profile JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_authority_org_type UNIQUE (organization_id, authority_type),
    CONSTRAINT chk_authority_type CHECK (
        authority_type IN ('mha', 'hqs', 'ghp', 'other')
    )
);
"#;

/// All statements in dependency order.
pub const ALL_DDL: &[&str] = &[
    SCHEMA_DDL,
    PROPERTIES_DDL,
    EMAILS_DDL,
    HOUSING_AUTHORITIES_DDL,
    TASKS_DDL,
    AI_ANALYSIS_LOGS_DDL,
];
