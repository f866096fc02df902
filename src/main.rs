use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use inspection_reminders::config::database::DatabaseConfig;
use inspection_reminders::config::environment::EnvironmentConfig;
use inspection_reminders::database::DatabaseConnection;
use inspection_reminders::repositories::{CustomerStore, InMemoryCustomerStore, PgCustomerStore};
use inspection_reminders::routes::create_app;
use inspection_reminders::services::line_messaging_service::LineMessagingClient;
use inspection_reminders::services::scheduler::run_daily;
use inspection_reminders::state::AppState;

#[derive(Parser)]
#[command(
    name = "inspection_reminders",
    version,
    about = "🚗 Registro de clientes ตรอ. con recordatorios de พ.ร.บ./seguro por LINE"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Servidor web + aviso diario (por defecto)
    Serve,
    /// Crear las tablas de la base de datos y salir
    DbCreate,
    /// Ejecutar la revisión de vencimientos una vez y salir
    NotifyNow {
        /// Fecha a evaluar (YYYY-MM-DD); por defecto hoy en la zona del taller
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EnvironmentConfig::from_env().context("Configuración inválida")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::DbCreate => {
            let db = connect(&config).await?;
            db.run_migrations().await?;
            info!("✅ Tablas creadas");
            Ok(())
        }
        Command::NotifyNow { date } => {
            let state = build_state(&config).await?;
            let today = date.unwrap_or_else(|| state.today());
            let summary = state.reminder_job.run(today).await?;
            info!(
                "📬 Revisión manual: {} enviados, {} fallidos",
                summary.sent, summary.failed
            );
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn connect(config: &EnvironmentConfig) -> Result<DatabaseConnection> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let db_config = DatabaseConfig::new(url, config.db_max_connections);
    DatabaseConnection::new(&db_config)
        .await
        .context("Error de base de datos")
}

async fn build_state(config: &EnvironmentConfig) -> Result<AppState> {
    let store: Arc<dyn CustomerStore> = match config.database_url {
        Some(_) => {
            let db = connect(config).await?;
            db.run_migrations().await?;
            Arc::new(PgCustomerStore::new(db.pool().clone()))
        }
        None => {
            warn!("⚠️ DATABASE_URL no definido: usando almacenamiento en memoria (no persistente)");
            Arc::new(InMemoryCustomerStore::new())
        }
    };

    let http_client = reqwest::Client::builder()
        .timeout(config.notification.push_timeout)
        .build()
        .context("Failed to create HTTP client")?;
    let messenger = Arc::new(LineMessagingClient::new(&config.line, http_client));

    Ok(AppState::new(store, messenger, config.clone()))
}

async fn serve(config: EnvironmentConfig) -> Result<()> {
    info!("🚗 Inspection Reminders - {}", config.environment);
    info!("================================================");

    let state = build_state(&config).await?;

    let scheduler_handle = tokio::spawn(run_daily(state.reminder_job.clone(), state.schedule()));

    let app = create_app(state);
    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  / - Lista de clientes");
    info!("   GET  /add, POST /add - Alta de cliente");
    info!("   GET  /edit/:id, POST /edit/:id - Edición de cliente");
    info!("   POST /delete/:id - Baja de cliente");
    info!("   GET  /expiring-prb - พ.ร.บ. próximos a vencer");
    info!("   GET  /expiring-insurance - Seguros próximos a vencer");
    info!("   POST /callback - Webhook de LINE");
    info!("   GET  /health - Health check");
    info!("   GET  /api/reminders/preview - Recordatorios de hoy (sin enviar)");
    info!("⏰ Hora local actual: {}", Utc::now().with_timezone(&config.notification.timezone));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler_handle.abort();

    if let Err(e) = result {
        error!("❌ Servidor terminó con error: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
