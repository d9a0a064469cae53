#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    /// Everything after the command, untouched apart from trimming.
    pub text: String,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let text = text.trim();
        let (prefix, rest) = text.split_once(' ').unwrap_or((text, ""));

        let cmd = SlashCommand {
            command: prefix.to_string(),
            text: rest.trim().to_string(),
        };
        if cmd.is_quit()
            || cmd.is_paste()
            || cmd.is_link()
            || cmd.is_upload()
            || cmd.is_sources()
            || cmd.is_generate()
            || cmd.is_help()
        {
            return Some(cmd);
        }

        return None;
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_paste(&self) -> bool {
        return ["/p", "/paste"].contains(&self.command.as_str()) && !self.text.is_empty();
    }

    pub fn is_link(&self) -> bool {
        return ["/l", "/link"].contains(&self.command.as_str())
            && !self.text.is_empty()
            && !self.text.contains(char::is_whitespace);
    }

    /// The path may contain spaces.
    pub fn is_upload(&self) -> bool {
        return ["/u", "/upload"].contains(&self.command.as_str()) && !self.text.is_empty();
    }

    pub fn is_sources(&self) -> bool {
        return ["/s", "/sources"].contains(&self.command.as_str());
    }

    pub fn is_generate(&self) -> bool {
        return ["/g", "/generate"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }
}

/// Text that was meant as a command but did not parse as one, like an
/// unknown command or `/paste` without text.
pub fn is_malformed_command(text: &str) -> bool {
    let text = text.trim();
    let Some(name) = text.strip_prefix('/') else {
        return false;
    };
    if !name.starts_with(|e: char| return e.is_ascii_alphabetic()) {
        return false;
    }

    return SlashCommand::parse(text).is_none();
}

pub fn help_text() -> String {
    return r#"
COMMANDS:
- /paste (/p) [TEXT] - Attaches pasted text as a custom source.
- /link (/l) [URL] - Extracts a web page and attaches it as a custom source.
- /upload (/u) [PATH] - Uploads a local file and attaches it as a custom source.
- /sources (/s) - Lists the custom sources attached to this session.
- /generate (/g) - Generates the audiocast once the assistant has summarized the session.
- /help (/h) - Provides this help menu.
- /quit (/q) - Exit Audiora.
    "#
    .trim()
    .to_string();
}
