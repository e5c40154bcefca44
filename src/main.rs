mod config;
mod quiz;

use std::sync::Arc;

use dotenv::dotenv;
use log::{error, info, warn};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    net::Download,
    prelude::*,
    types::{ChatAction, ChatId, KeyboardButton, KeyboardMarkup},
};
use tokio::sync::Mutex;

use config::Config;
use quiz::engine::{Engine, NEXT_QUESTION_PROMPT};
use quiz::narration::{LogSink, Narrator};
use quiz::profile::INITIAL_PERFORMANCE;
use quiz::store::ImportError;
use quiz::Question;

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = Arc<ErasedStorage<State>>;
type SharedEngine = Arc<Mutex<Engine>>;

/// Runs `f` with the engine locked. Engine calls that touch the JSON files
/// block, so they run through `block_in_place` to keep the dispatcher going.
async fn with_engine<T>(engine: &SharedEngine, f: impl FnOnce(&mut Engine) -> T) -> T {
    let mut engine = engine.lock().await;
    tokio::task::block_in_place(|| f(&mut *engine))
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceivePlayerName,
    Menu {
        player: String,
    },
    Quiz {
        player: String,
        question: Question,
        score: u32,
    },
    ConfirmGenerated {
        player: String,
        question: Question,
    },
    ReceiveImport {
        player: String,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    info!("Starting Bible Quest bot...");

    let config = Config::from_env();

    let narrator = if config.narration {
        Narrator::spawn(LogSink)
    } else {
        Narrator::silent()
    };
    let engine = match Engine::open(&config, narrator) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to load the quiz data: {}", e);
            std::process::exit(1);
        }
    };
    info!("{} questions available", engine.question_count());
    let engine: SharedEngine = Arc::new(Mutex::new(engine));

    let bot = Bot::from_env();

    info!("Opening dialogue storage {}", config.dialogue_db);
    let storage: DialogueStorage = match SqliteStorage::open(&config.dialogue_db, Json).await {
        Ok(storage) => storage.erase(),
        Err(e) => {
            error!("Failed to open {}: {}", config.dialogue_db, e);
            std::process::exit(1);
        }
    };

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceivePlayerName].endpoint(receive_player_name))
            .branch(dptree::case![State::Menu { player }].endpoint(menu))
            .branch(
                dptree::case![State::Quiz {
                    player,
                    question,
                    score
                }]
                .endpoint(quiz_answer),
            )
            .branch(
                dptree::case![State::ConfirmGenerated { player, question }]
                    .endpoint(confirm_generated),
            )
            .branch(dptree::case![State::ReceiveImport { player }].endpoint(receive_import)),
    )
    .dependencies(dptree::deps![storage, engine])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "🧠 Bible Quest AI\n\nEntre ton nom pour sauvegarder ta progression :";

const START_TRAINING: &str = "Lancer l'entraînement";
const GENERATE_QUESTION: &str = "Générer une nouvelle question";
const IMPORT_QUESTIONS: &str = "Importer des questions (JSON)";
const SHOW_PROFILES: &str = "Voir profils sauvegardés";
const CHANGE_PLAYER: &str = "Changer de joueur";
const BACK_TO_MENU: &str = "← Retour au menu";
const YES: &str = "Oui";
const NO: &str = "Non";

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(START_TRAINING)],
        vec![
            KeyboardButton::new(GENERATE_QUESTION),
            KeyboardButton::new(IMPORT_QUESTIONS),
        ],
        vec![
            KeyboardButton::new(SHOW_PROFILES),
            KeyboardButton::new(CHANGE_PLAYER),
        ],
    ])
}

fn question_keyboard(question: &Question) -> KeyboardMarkup {
    let mut rows = question
        .options
        .iter()
        .map(|o| vec![KeyboardButton::new(o.clone())])
        .collect::<Vec<_>>();
    rows.push(vec![KeyboardButton::new(BACK_TO_MENU)]);
    KeyboardMarkup::new(rows)
}

async fn show_menu(
    bot: &Bot,
    dialogue: &QuizDialogue,
    chat_id: ChatId,
    player: String,
    text: &str,
) -> HandlerResult {
    bot.send_message(chat_id, text)
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::Menu { player }).await?;
    Ok(())
}

async fn report_failure(
    bot: &Bot,
    chat_id: ChatId,
    context: &str,
    err: impl std::fmt::Display,
) -> HandlerResult {
    warn!("{}: {}", context, err);
    bot.send_message(chat_id, format!("{} : {}", context, err))
        .await?;
    Ok(())
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    dialogue.update(State::ReceivePlayerName).await?;
    Ok(())
}

async fn receive_player_name(
    bot: Bot,
    dialogue: QuizDialogue,
    engine: SharedEngine,
    msg: Message,
) -> HandlerResult {
    let Some(name) = msg.text().map(str::trim).filter(|n| !n.is_empty()) else {
        bot.send_message(msg.chat.id, "Ton nom (sera utilisé pour sauvegarder ta progression) :")
            .await?;
        return Ok(());
    };

    let loaded = with_engine(&engine, |engine| {
        let existed = engine.profile(name).is_some();
        engine.get_or_create(name).map(|profile| (existed, profile))
    })
    .await;
    let greeting = match loaded {
        Ok((true, profile)) => format!(
            "Bienvenue {} — niveau restauré : {} (perf : {}%)",
            name,
            profile.level,
            profile.percent()
        ),
        Ok((false, _)) => format!("Profil créé pour {}", name),
        Err(e) => return report_failure(&bot, msg.chat.id, "Impossible de sauvegarder le profil", e).await,
    };

    show_menu(&bot, &dialogue, msg.chat.id, name.to_string(), &greeting).await
}

async fn menu(
    bot: Bot,
    dialogue: QuizDialogue,
    player: String,
    engine: SharedEngine,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(START_TRAINING) => {
            let prompt = engine.lock().await.thinking_prompt();
            bot.send_message(msg.chat.id, prompt).await?;
            send_next_question(&bot, &dialogue, &engine, msg.chat.id, player, 0).await
        }
        Some(GENERATE_QUESTION) => {
            let generated = {
                let mut engine = engine.lock().await;
                let topic = engine.random_topic();
                let difficulty = engine.random_difficulty();
                engine.generate_one(topic, difficulty)
            };
            let question = match generated {
                Ok(question) => question,
                Err(e) => {
                    report_failure(&bot, msg.chat.id, "Impossible de générer une question", e)
                        .await?;
                    return Ok(());
                }
            };

            bot.send_message(
                msg.chat.id,
                format!(
                    "Question générée [{}] {}\n\n{}\nRéponse attendue : {}",
                    question.difficulty, question.topic, question.question, question.answer
                ),
            )
            .await?;
            bot.send_message(msg.chat.id, "Souhaites-tu ajouter cette question à la base ?")
                .reply_markup(KeyboardMarkup::new(vec![vec![
                    KeyboardButton::new(YES),
                    KeyboardButton::new(NO),
                ]]))
                .await?;
            dialogue
                .update(State::ConfirmGenerated { player, question })
                .await?;
            Ok(())
        }
        Some(IMPORT_QUESTIONS) => {
            bot.send_message(
                msg.chat.id,
                "Envoie un fichier .json ou colle une liste JSON de questions :\n\
                 [{\"question\": \"…\", \"options\": [\"…\"], \"answer\": \"…\", \"difficulty\": \"Débutant\", \"topic\": \"…\"}]",
            )
            .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(BACK_TO_MENU)]]))
            .await?;
            dialogue.update(State::ReceiveImport { player }).await?;
            Ok(())
        }
        Some(SHOW_PROFILES) => {
            let lines = {
                let engine = engine.lock().await;
                engine
                    .profiles()
                    .iter()
                    .map(|(name, p)| {
                        format!(
                            "{} — niveau: {} — perf: {}% — créé: {}",
                            name,
                            p.level,
                            p.percent(),
                            p.created_date()
                        )
                    })
                    .collect::<Vec<_>>()
            };
            let text = if lines.is_empty() {
                "Aucun profil sauvegardé.".to_string()
            } else {
                lines.join("\n")
            };
            show_menu(&bot, &dialogue, msg.chat.id, player, &text).await
        }
        Some(CHANGE_PLAYER) => {
            bot.send_message(msg.chat.id, GREETING_TEXT).await?;
            dialogue.update(State::ReceivePlayerName).await?;
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, "Choisis une des options du menu.")
                .reply_markup(menu_keyboard())
                .await?;
            Ok(())
        }
    }
}

async fn send_next_question(
    bot: &Bot,
    dialogue: &QuizDialogue,
    engine: &SharedEngine,
    chat_id: ChatId,
    player: String,
    score: u32,
) -> HandlerResult {
    // Typing indicator only, it doesn't matter if it fails.
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let selected = with_engine(engine, |engine| {
        let (performance, level) = engine
            .profile(&player)
            .map(|p| (p.performance, p.level))
            .unwrap_or((INITIAL_PERFORMANCE, Default::default()));
        engine
            .select_next(performance)
            .map(|question| (question, performance, level))
    })
    .await;
    let (question, performance, level) = match selected {
        Ok(selected) => selected,
        Err(e) => {
            report_failure(bot, chat_id, "Impossible de choisir une question", e).await?;
            return show_menu(bot, dialogue, chat_id, player, "Retour au menu.").await;
        }
    };

    let text = format!(
        "[{}]  {}\n\n{}\n\nJoueur: {} | Niveau: {} | Perf: {}% | Score: {}",
        question.difficulty,
        question.topic,
        question.question,
        player,
        level,
        (performance * 100.0) as u32,
        score
    );
    bot.send_message(chat_id, text)
        .reply_markup(question_keyboard(&question))
        .await?;

    dialogue
        .update(State::Quiz {
            player,
            question,
            score,
        })
        .await?;
    Ok(())
}

async fn quiz_answer(
    bot: Bot,
    dialogue: QuizDialogue,
    (player, question, score): (String, Question, u32),
    engine: SharedEngine,
    msg: Message,
) -> HandlerResult {
    let given = match msg.text() {
        Some(BACK_TO_MENU) => {
            let summary = format!("Entraînement terminé ! Score : {}", score);
            return show_menu(&bot, &dialogue, msg.chat.id, player, &summary).await;
        }
        Some(text) if question.has_option(text) => text,
        _ => {
            bot.send_message(msg.chat.id, "Choisis une réponse avant de valider.")
                .reply_markup(question_keyboard(&question))
                .await?;
            return Ok(());
        }
    };

    let recorded =
        with_engine(&engine, |engine| engine.record_answer(&player, &question, given)).await;
    let outcome = match recorded {
        Ok(outcome) => outcome,
        Err(e) => {
            return report_failure(&bot, msg.chat.id, "Impossible d'enregistrer la réponse", e)
                .await
        }
    };

    let (score, verdict) = if outcome.correct {
        (score + 1, "Bonne réponse ! Ta progression augmente.".to_string())
    } else {
        (
            score,
            format!(
                "Mauvaise réponse. La bonne réponse était : {}",
                outcome.correct_answer
            ),
        )
    };
    bot.send_message(msg.chat.id, verdict).await?;

    engine.lock().await.narrate(NEXT_QUESTION_PROMPT);
    send_next_question(&bot, &dialogue, &engine, msg.chat.id, player, score).await
}

async fn confirm_generated(
    bot: Bot,
    dialogue: QuizDialogue,
    (player, question): (String, Question),
    engine: SharedEngine,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(YES) => {
            let added = with_engine(&engine, |engine| engine.add_question(question)).await;
            let text = match added {
                Ok(()) => "Question ajoutée au fichier de questions.".to_string(),
                Err(e) => {
                    warn!("Could not store generated question: {}", e);
                    format!("Impossible d'ajouter la question : {}", e)
                }
            };
            show_menu(&bot, &dialogue, msg.chat.id, player, &text).await
        }
        Some(NO) => show_menu(&bot, &dialogue, msg.chat.id, player, "Question ignorée.").await,
        _ => {
            bot.send_message(msg.chat.id, "Réponds par Oui ou Non.")
                .reply_markup(KeyboardMarkup::new(vec![vec![
                    KeyboardButton::new(YES),
                    KeyboardButton::new(NO),
                ]]))
                .await?;
            Ok(())
        }
    }
}

async fn receive_import(
    bot: Bot,
    dialogue: QuizDialogue,
    player: String,
    engine: SharedEngine,
    msg: Message,
) -> HandlerResult {
    if msg.text() == Some(BACK_TO_MENU) {
        return show_menu(&bot, &dialogue, msg.chat.id, player, "Import annulé.").await;
    }

    let payload = if let Some(document) = msg.document() {
        let file = bot.get_file(&document.file.id).await?;
        let mut content = Vec::new();
        bot.download_file(&file.path, &mut content).await?;
        String::from_utf8_lossy(&content).into_owned()
    } else if let Some(text) = msg.text() {
        text.to_string()
    } else {
        bot.send_message(msg.chat.id, "Envoie un fichier .json ou du texte JSON.")
            .await?;
        return Ok(());
    };

    let imported = with_engine(&engine, |engine| engine.import_batch(&payload)).await;
    let text = match imported {
        Ok(count) => format!("{} questions importées.", count),
        Err(ImportError::NotAnArray) => {
            "Le fichier doit contenir une liste JSON de questions.".to_string()
        }
        Err(e) => {
            warn!("Import failed: {}", e);
            format!("Impossible d'importer : {}", e)
        }
    };
    show_menu(&bot, &dialogue, msg.chat.id, player, &text).await
}
