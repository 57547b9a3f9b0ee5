//! Reply texts
//!
//! Replies use the transport's HTML subset; anything that comes from a
//! record goes through [`escape_html`].

use crate::config::DialogConfig;
use crate::db::{AccountLink, Student};

pub const NOT_VERIFIED: &str =
    "⚠️ Non hai ancora effettuato la verifica dell'account!\n\nUsa /start per iniziare!";

pub const LOGOUT_AND_RETRY: &str =
    "↩️ Allora effettua il logout da tutti gli account Google sul tuo browser, poi riprova!";

pub const VISIBILITY_QUESTION: &str = "📝 Vuoi aggiungere il tuo nome e la tua email alla rubrica del gruppo?\n\n\
     Questo li renderà visibili a tutti gli altri membri verificati.\n\n\
     (Gli amministratori del gruppo vi avranno comunque accesso, e potrai cambiare idea in qualsiasi \
     momento con il comando /privacy.)";

pub const NOW_HIDDEN: &str = "❌ I tuoi dati ora sono nascosti dalla rubrica del gruppo.";

pub const NOW_VISIBLE: &str = "✅ I tuoi dati ora sono visibili nella rubrica del gruppo!";

pub const QUERY_NOT_UNDERSTOOD: &str = "⚠️ Non hai specificato correttamente cosa cercare.\n\n\
     Puoi specificare un'username Telegram, un nome e cognome o un'email.";

pub const NO_STUDENT_FOUND: &str = "⚠️ Nessuno studente trovato.";

pub const STUDENT_PRIVATE: &str =
    "👤 Lo studente è registrato, ma ha deciso di mantenere privati i dettagli del suo account.";

pub const SOME_STUDENTS_PRIVATE: &str = "👤 Almeno uno studente ottenuto dalla ricerca è registrato, \
     ma ha deciso di mantenere privati i dettagli del suo account.";

pub const GENERIC_FAILURE: &str = "⚠️ Si è verificato un errore imprevisto. Riprova più tardi.";

pub fn private_chat_only(config: &DialogConfig) -> String {
    format!(
        "⚠️ Questo comando funziona solo in chat privata (@{}).",
        config.bot_username
    )
}

pub fn welcome(config: &DialogConfig) -> String {
    format!(
        "👋 Ciao! Sono Thor, il bot-moderatore di Unimore Informatica.\n\n\
         Per entrare nel gruppo devi <a href=\"{}\">effettuare la verifica dell'identità \
         facendo il login qui con il tuo account Unimore</a>.\n\n\
         Se hai bisogno di aiuto, manda un messaggio a {}.",
        escape_html(&config.login_url),
        escape_html(&config.support_contact)
    )
}

fn group_invite(config: &DialogConfig) -> String {
    format!(
        "<a href=\"{}\">Entra nel gruppo cliccando qui!</a>",
        escape_html(&config.group_link)
    )
}

pub fn already_verified(config: &DialogConfig) -> String {
    format!(
        "⭐️ Hai già effettuato la verifica dell'identità.\n\n{}",
        group_invite(config)
    )
}

pub fn verified(config: &DialogConfig) -> String {
    format!(
        "✨ Hai completato la verifica dell'identità.\n\n{}",
        group_invite(config)
    )
}

pub fn already_linked(other: &Student) -> String {
    format!(
        "⚠️ Questo account Telegram è già connesso a <b>{}</b>.",
        escape_html(&other.full_name())
    )
}

pub fn confirm_identity(student: &Student, config: &DialogConfig) -> String {
    format!(
        "❔ Tu sei {} &lt;{}&gt;, giusto?",
        escape_html(&student.full_name()),
        escape_html(&config.email_of(&student.email_prefix))
    )
}

/// Directory entry of a linked student
pub fn profile(student: &Student, link: &AccountLink, config: &DialogConfig) -> String {
    format!(
        "👤 <b>{}</b>\n✉️ {}\n💬 {}",
        escape_html(&student.full_name()),
        escape_html(&config.email_of(&student.email_prefix)),
        escape_html(&link.handle())
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
