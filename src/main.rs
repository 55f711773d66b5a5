use actionweb::config::{AppConfig, LogFormat};
use actionweb::filters::{ControllerFilter, FilterChain, FilterContext, FilterDecision};
use actionweb::logging::{JsonLineSink, LogSink, TracingSink};
use actionweb::routing::{route, RouteConfig, Router};
use actionweb::server::{build_app, handler::AppState};
use actionweb::views::Templates;
use actionweb::{ActionOutcome, ControllerDef, ControllerRegistry, RequestDispatcher, ViewSpec};
use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "actionweb=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting actionweb");

    actionweb::middleware::init_metrics()?;
    info!("Initialized Prometheus metrics exporter");

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "actionweb.yaml".to_string());
    info!("Loading configuration from: {}", config_path);

    let config = AppConfig::load_or_default(&config_path)?;
    config.validate()?;

    let routes = if config.routes.is_empty() {
        demo_routes()
    } else {
        config.route_config()
    };
    info!("Loaded {} routes", routes.len());

    let registry = demo_controllers(&config.controllers.root_package);
    info!("Registered controllers: {}", registry.names().join(", "));

    let templates = match &config.views.directory {
        Some(dir) => Templates::from_dir(dir, &config.views.extension)?,
        None => demo_templates(&config.views.extension),
    }
    .with_system_pages();

    let log: Arc<dyn LogSink> = match config.logging.format {
        LogFormat::Json => Arc::new(JsonLineSink::stdout()),
        LogFormat::Tracing => Arc::new(TracingSink),
    };

    let mut filters = FilterChain::new();
    filters.add_global(Arc::new(TimingFilter));

    let router = Router::new(Arc::new(routes), Arc::new(registry))
        .with_root_controller(config.controllers.root_controller.clone());
    let dispatcher = RequestDispatcher::new(router, Arc::new(templates), log)
        .with_filters(filters)
        .with_default_layout(config.views.default_layout.clone())
        .log_requests(config.logging.log_requests);

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        max_body_size: config.server.max_body_size,
    };
    let app = build_app(state, &config.server);

    let host = std::env::var("HOST").unwrap_or_else(|_| config.server.host.clone());
    let port = std::env::var("PORT").unwrap_or_else(|_| config.server.port.to_string());
    let bind_addr = format!("{}:{}", host, port);

    info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Records when a request entered the controller and reports the time spent
struct TimingFilter;

impl ControllerFilter for TimingFilter {
    fn before(&self, ctx: &mut FilterContext<'_>) -> Result<FilterDecision> {
        ctx.set_attribute("started_at", chrono::Utc::now().timestamp_millis());
        Ok(FilterDecision::Continue)
    }

    fn after(&self, ctx: &mut FilterContext<'_>) {
        if let Some(started) = ctx.attribute("started_at").and_then(|v| v.as_i64()) {
            debug!(
                "{}#{} took {}ms (status {:?})",
                ctx.controller(),
                ctx.action(),
                chrono::Utc::now().timestamp_millis() - started,
                ctx.status()
            );
        }
    }

    fn name(&self) -> &str {
        "timing"
    }
}

fn demo_routes() -> RouteConfig {
    RouteConfig::from_builders([
        route("/books/{id}").to("books").action("show").get(),
        route("/books").to("books").action("create").post(),
        route("/api/v2/{controller}/{aut_id}").action("find_by_id"),
    ])
}

fn demo_controllers(root_package: &str) -> ControllerRegistry {
    let mut registry = ControllerRegistry::new(root_package);
    registry
        .register(ControllerDef::new("home").action("index", |ctx| {
            ctx.assign("title", "Welcome");
            Ok(ActionOutcome::render())
        }))
        .register(
            ControllerDef::new("books")
                .action("index", |ctx| {
                    ctx.assign("title", "Books");
                    ctx.assign("books", json!(["Dune", "Solaris"]));
                    Ok(ActionOutcome::render())
                })
                .action("show", |ctx| {
                    let id = ctx.id().unwrap_or_default().to_string();
                    ctx.assign("title", format!("Book {}", id));
                    ctx.assign("id", id);
                    Ok(ActionOutcome::render())
                })
                .action("create", |ctx| match ctx.param("title") {
                    Some(title) if !title.is_empty() => {
                        info!("Created book {}", title);
                        Ok(ActionOutcome::redirect("/books"))
                    }
                    _ => Ok(ActionOutcome::text_with_status(422, "title is required")),
                }),
        )
        .register(ControllerDef::new("api/v2/authors").action("find_by_id", |ctx| {
            let id = ctx.param("aut_id").unwrap_or_default().to_string();
            ctx.assign("id", id);
            Ok(ActionOutcome::view(
                ViewSpec::new()
                    .template("/api/author")
                    .no_layout()
                    .content_type("application/json"),
            ))
        }));
    registry
}

fn demo_templates(extension: &str) -> Templates {
    Templates::new(extension)
        .with_template(
            "/layouts/default_layout",
            "<html><head><title><@yield to=\"title\"/></title></head><body>${page_content}</body></html>",
        )
        .with_template(
            "/home/index",
            "<@content for=\"title\">${title}</@content><h1>${title}</h1><p><a href=\"/books\">Books</a></p>",
        )
        .with_template(
            "/books/index",
            "<@content for=\"title\">${title}</@content><h1>${title}</h1><p>${books}</p>",
        )
        .with_template(
            "/books/show",
            "<@content for=\"title\">${title}</@content><h1>${title}</h1><p>id: ${id}</p>",
        )
        .with_template("/api/author", "{\"id\": \"${id}\"}")
}

/// Handle shutdown signals for graceful termination
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully");
        },
    }

    tracing::info!("Draining connections...");
    tokio::time::sleep(Duration::from_secs(1)).await;
}
