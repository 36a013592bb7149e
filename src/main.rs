mod audio;
mod avatar;
mod chat;
mod config;
mod controllers;
mod error;
mod logging;
mod preformed;
mod say;
mod scheduler;
mod tween;
mod ws;

use std::env;
use std::sync::Arc;

use tracing::{error, info, warn};

use audio::AudioPlayer;
use avatar::AvatarClient;
use config::ConfigStore;
use controllers::idle::{BlinkCycle, BodySwingCycle, BreathingCycle, MouthExpressionCycle};
use controllers::oneshot::{ExpressionApplyController, MouthSyncController};
use controllers::{ControllerContext, ControllerManager, IdleController};
use preformed::AnimationTemplatePlayer;
use say::{SayConfig, SayHandler, TtsClient};
use scheduler::ActionScheduler;
use tween::Tweener;
use ws::hub::WsHub;
use ws::routes::AppState;

struct Settings {
    avatar_endpoint: String,
    plugin_name: String,
    plugin_developer: String,
    tts_base_url: String,
    configs_dir: String,
    global_config_path: String,
    templates_dir: String,
    sounds_dir: String,
    static_dir: String,
    listen_addr: String,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            avatar_endpoint: env::var("AVATAR_ENDPOINT").unwrap_or_else(|_| "ws://127.0.0.1:8001".to_string()),
            plugin_name: env::var("PLUGIN_NAME").unwrap_or_else(|_| "LiveAvatarOrchestrator".to_string()),
            plugin_developer: env::var("PLUGIN_DEVELOPER").unwrap_or_else(|_| "orchestrator-team".to_string()),
            tts_base_url: env::var("TTS_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
            configs_dir: env::var("CONFIGS_DIR").unwrap_or_else(|_| "data/configs/models".to_string()),
            global_config_path: env::var("GLOBAL_CONFIG_PATH").unwrap_or_else(|_| "data/configs/global.yaml".to_string()),
            templates_dir: env::var("TEMPLATES_DIR").unwrap_or_else(|_| "data/resources/animations".to_string()),
            sounds_dir: env::var("SOUNDS_DIR").unwrap_or_else(|_| "data/resources/sounds".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string()),
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    let settings = Settings::from_env();

    let config_store = ConfigStore::new(settings.configs_dir.clone(), settings.global_config_path.clone());
    let global_config = match config_store.load_global() {
        Ok(config) => config,
        Err(err) => {
            warn!(%err, "failed to load global config, using defaults");
            config::GlobalConfig::default()
        }
    };

    let endpoint = if global_config.auth.endpoint.is_empty() { settings.avatar_endpoint.clone() } else { global_config.auth.endpoint.clone() };
    let avatar = Arc::new(AvatarClient::new(endpoint, settings.plugin_name.clone(), settings.plugin_developer.clone()));

    match avatar.connect_and_authenticate(global_config.auth.token.clone()).await {
        Ok(true) => info!("authenticated with avatar host"),
        Ok(false) => {
            error!("avatar host rejected authentication, exiting");
            std::process::exit(1);
        }
        Err(err) => {
            error!(%err, "failed to connect to avatar host, exiting");
            std::process::exit(1);
        }
    }

    let model_name = avatar
        .current_model()
        .await
        .ok()
        .and_then(|value| value.get("modelName").and_then(|v| v.as_str()).map(str::to_string));

    let mut controller_config = config_store.load_model_config(model_name.as_deref()).unwrap_or_else(|err| {
        warn!(%err, "failed to load model config, using defaults");
        config::ControllerConfig::default()
    });
    if let Err(err) = config_store.save_model_config(model_name.as_deref(), &controller_config) {
        warn!(%err, "failed to persist merged model config");
    }

    let mut persisted_global = global_config;
    persisted_global.auth.endpoint = avatar_endpoint_for_persistence(&settings, &persisted_global);
    persisted_global.auth.token = avatar.cached_token();
    if let Err(err) = config_store.save_global(&persisted_global) {
        warn!(%err, "failed to persist global config");
    }

    let tweener = Tweener::new(avatar.clone());
    tweener.start_keep_alive();

    let ctx = ControllerContext { tweener: tweener.clone(), avatar: avatar.clone() };

    let mut manager = ControllerManager::new();
    manager.register_idle(IdleController::new("Blink", ctx.clone(), BlinkCycle::new(std::mem::take(&mut controller_config.blink).0)));
    manager.register_idle(IdleController::new("Breathing", ctx.clone(), BreathingCycle::new(std::mem::take(&mut controller_config.breathing).0)));
    manager.register_idle(IdleController::new("BodySwing", ctx.clone(), BodySwingCycle::new(std::mem::take(&mut controller_config.body_swing).0)));
    manager.register_idle(IdleController::new(
        "MouthExpression",
        ctx.clone(),
        MouthExpressionCycle::new(std::mem::take(&mut controller_config.mouth_expression).0),
    ));
    manager.register_oneshot(Arc::new(MouthSyncController::new(std::mem::take(&mut controller_config.mouth_sync).0)));
    manager.register_oneshot(Arc::new(ExpressionApplyController::new()));
    let manager = Arc::new(manager);
    manager.start_all_idle().await;

    let audio = Arc::new(AudioPlayer::new(settings.sounds_dir.clone()));
    let tts = TtsClient::new(settings.tts_base_url.clone());
    let ws_hub = Arc::new(WsHub::new());
    let say_handler = Arc::new(SayHandler::new(SayConfig::default(), tts, manager.clone(), ctx.clone(), ws_hub.clone()));
    let scheduler = ActionScheduler::new(tweener.clone(), avatar.clone(), audio.clone(), say_handler);
    let templates = Arc::new(AnimationTemplatePlayer::new(settings.templates_dir.clone(), scheduler.clone()));

    if persisted_global.chat.room.is_empty() {
        info!("no chat room configured, live chat bridge disabled");
    } else {
        warn!("live chat bridge has no configured chat source implementation, skipping");
    }

    let app_state = AppState { scheduler: scheduler.clone(), templates, avatar: avatar.clone(), audio: audio.clone(), ws_hub: ws_hub.clone() };
    let router = ws::routes::router(app_state, settings.static_dir.clone().into());

    let listener = match tokio::net::TcpListener::bind(&settings.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, addr = %settings.listen_addr, "failed to bind listen address");
            shutdown(&manager, &tweener, &avatar, &config_store, &persisted_global).await;
            std::process::exit(1);
        }
    };
    info!(addr = %settings.listen_addr, "accepting connections");

    let serve_result = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;
    if let Err(err) = serve_result {
        error!(%err, "http server exited with error");
    }

    shutdown(&manager, &tweener, &avatar, &config_store, &persisted_global).await;
}

fn avatar_endpoint_for_persistence(settings: &Settings, current: &config::GlobalConfig) -> String {
    if current.auth.endpoint.is_empty() { settings.avatar_endpoint.clone() } else { current.auth.endpoint.clone() }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn shutdown(manager: &ControllerManager, tweener: &Arc<Tweener>, avatar: &Arc<AvatarClient>, config_store: &ConfigStore, global_config: &config::GlobalConfig) {
    info!("shutting down");

    if let Err(err) = config_store.save_global(global_config) {
        warn!(%err, "failed to persist global config on shutdown");
    }

    manager.stop_all_idle();
    tweener.release_all();
    tweener.stop_keep_alive();

    avatar.disconnect().await;
}
