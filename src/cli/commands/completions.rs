use crate::cli::{Cli, Shell};
use clap::CommandFactory;
use clap_complete::{generate, Shell as ClapShell};
use std::io;

const BIN_NAME: &str = "overrides";

fn clap_shell(shell: &Shell) -> ClapShell {
    match shell {
        Shell::Bash => ClapShell::Bash,
        Shell::Zsh => ClapShell::Zsh,
        Shell::Fish => ClapShell::Fish,
        Shell::PowerShell => ClapShell::PowerShell,
        Shell::Elvish => ClapShell::Elvish,
    }
}

pub fn execute(shell: Shell) {
    let mut cmd = Cli::command();

    eprintln!("Generating completion file for {:?}...", shell);
    generate(clap_shell(&shell), &mut cmd, BIN_NAME, &mut io::stdout());
    eprintln!("\n# Installation instructions:");

    match shell {
        Shell::Bash => {
            eprintln!("# Add to ~/.bashrc:");
            eprintln!("#   eval \"$(overrides completions bash)\"");
        }
        Shell::Zsh => {
            eprintln!("# Add to ~/.zshrc:");
            eprintln!("#   eval \"$(overrides completions zsh)\"");
            eprintln!("# Or save to completion directory:");
            eprintln!("#   overrides completions zsh > ~/.zfunc/_overrides");
        }
        Shell::Fish => {
            eprintln!("# Save to fish completion directory:");
            eprintln!("#   overrides completions fish > ~/.config/fish/completions/overrides.fish");
        }
        Shell::PowerShell => {
            eprintln!("# Add to PowerShell profile:");
            eprintln!("#   overrides completions powershell | Out-String | Invoke-Expression");
        }
        Shell::Elvish => {
            eprintln!("# Add to Elvish config:");
            eprintln!("#   eval (overrides completions elvish | slurp)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions_mention_subcommands() {
        let mut cmd = Cli::command();
        let mut out = Vec::new();
        generate(clap_shell(&Shell::Bash), &mut cmd, BIN_NAME, &mut out);

        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("refresh"));
        assert!(script.contains("--use-credentials-file"));
    }
}
