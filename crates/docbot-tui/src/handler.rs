use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use docbot_core::gate::{self, View};

use crate::app::{App, InputMode, LoginField};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply a cursor or editing key to a single-line input. Returns false for
/// keys it does not handle.
fn edit_line(text: &mut String, cursor: &mut usize, code: KeyCode) -> bool {
    let char_count = text.chars().count();
    *cursor = (*cursor).min(char_count);

    match code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(char_count),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = char_count,
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.on_tick().await,
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Pick up an expiry before acting on a protected screen
    app.sync_session();

    match (app.screen, app.input_mode) {
        (View::Login, _) => handle_login(app, key),
        (View::Admin, InputMode::Normal) => handle_admin_normal(app, key),
        (View::Admin, InputMode::Editing) => handle_path_editing(app, key).await,
        (View::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (View::Chat, InputMode::Editing) => handle_chat_editing(app, key),
    }
    Ok(())
}

/// Keys shared by the normal mode of every signed-in screen.
fn handle_common_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        // Number keys follow the header's link order
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            let session = app.session();
            if let Some(view) = gate::nav_links(session.as_ref()).get(index).copied() {
                app.navigate(view);
            }
        }
        KeyCode::Char('L') => app.logout(),
        _ => {}
    }
}

fn login_input(app: &mut App) -> &mut String {
    match app.login_field {
        LoginField::Username => &mut app.username,
        LoginField::Password => &mut app.password,
    }
}

fn handle_login(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.login_field = match app.login_field {
                LoginField::Username => LoginField::Password,
                LoginField::Password => LoginField::Username,
            };
        }
        KeyCode::Enter => match app.login_field {
            LoginField::Username => app.login_field = LoginField::Password,
            LoginField::Password => app.submit_login(),
        },
        KeyCode::Backspace => {
            login_input(app).pop();
        }
        KeyCode::Char(c) => login_input(app).push(c),
        _ => {}
    }
}

fn handle_admin_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.files_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.files_nav_up(),

        KeyCode::Char('r') => app.refresh_documents(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Char('o') => app.download_selected(),

        // Choose a file, then confirm it
        KeyCode::Char('u') | KeyCode::Char('/') => {
            app.notice = None;
            app.path_cursor = app.path_input.chars().count();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('y') | KeyCode::Enter => {
            if app.documents.selected().is_some() {
                app.confirm_upload();
            }
        }
        KeyCode::Char('x') | KeyCode::Esc => {
            app.documents.cancel_selection();
            app.notice = None;
        }

        _ => handle_common_normal(app, key),
    }
}

async fn handle_path_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            app.select_file_from_input().await;
            app.input_mode = InputMode::Normal;
        }
        code => {
            edit_line(&mut app.path_input, &mut app.path_cursor, code);
        }
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,

        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_chat_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_chat_up(app.chat_height.max(1)),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') => app.chat_scroll = 0,

        _ => handle_common_normal(app, key),
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.send_chat(),
        code => {
            edit_line(&mut app.chat.draft, &mut app.chat_cursor, code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use docbot_core::{DemoAuthenticator, HttpBackend, SessionStore};

    fn app() -> App {
        let sessions = SessionStore::new(Arc::new(DemoAuthenticator::default().with_delay(Duration::ZERO)));
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        App::with_parts(Arc::new(sessions), Arc::new(backend), std::env::temp_dir())
    }

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_edit_line_handles_multibyte() {
        let mut text = "héllo".to_string();
        let mut cursor = 2;

        edit_line(&mut text, &mut cursor, KeyCode::Backspace);
        assert_eq!(text, "hllo");
        assert_eq!(cursor, 1);

        edit_line(&mut text, &mut cursor, KeyCode::Char('ë'));
        assert_eq!(text, "hëllo");

        edit_line(&mut text, &mut cursor, KeyCode::End);
        edit_line(&mut text, &mut cursor, KeyCode::Delete);
        assert_eq!(text, "hëllo");
        assert!(!edit_line(&mut text, &mut cursor, KeyCode::Tab));
    }

    #[tokio::test]
    async fn test_login_form_typing_and_field_switch() {
        let mut app = app();
        for c in "admin".chars() {
            handle_event(&mut app, press(KeyCode::Char(c))).await.unwrap();
        }
        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.login_field, LoginField::Password);

        handle_event(&mut app, press(KeyCode::Char('x'))).await.unwrap();
        assert_eq!(app.username, "admin");
        assert_eq!(app.password, "x");
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_anywhere() {
        let mut app = app();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        handle_event(&mut app, AppEvent::Key(key)).await.unwrap();
        assert!(app.should_quit);
        assert!(app.username.is_empty());
    }
}
