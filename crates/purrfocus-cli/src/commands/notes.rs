use clap::Subcommand;
use purrfocus_core::{NoteDraft, NotePatch, Route};

use super::{print_json, CliResult, Context};

const PREVIEW_CHARS: usize = 60;

#[derive(Subcommand)]
pub enum NotesAction {
    /// List your notes
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one note
    Show { id: String },
    /// Create a note
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Change a note's title and/or content
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    Delete { id: String },
}

pub async fn run(action: NotesAction) -> CliResult {
    let mut ctx = Context::open().await?;
    ctx.require(Route::Notes)?;

    match action {
        NotesAction::List { json } => {
            let notes = ctx.app.notes();
            if json {
                print_json(&notes)?;
            } else if notes.is_empty() {
                println!("no notes yet");
            } else {
                for note in notes {
                    println!(
                        "{}  {}  {}",
                        note.id,
                        note.created_at.format("%Y-%m-%d"),
                        note.title
                    );
                    println!("    {}", note.preview(PREVIEW_CHARS));
                }
            }
        }
        NotesAction::Show { id } => {
            let note = ctx
                .app
                .note(&id)
                .ok_or_else(|| format!("note '{id}' not found"))?;
            print_json(note)?;
        }
        NotesAction::Add { title, content } => {
            let note = ctx.app.add_note(NoteDraft::new(title, content)).await?;
            print_json(&note)?;
        }
        NotesAction::Edit { id, title, content } => {
            let patch = NotePatch { title, content };
            if patch.is_empty() {
                return Err("nothing to change; pass --title and/or --content".into());
            }
            let note = ctx.app.update_note(&id, &patch).await?;
            print_json(&note)?;
        }
        NotesAction::Delete { id } => {
            ctx.app.delete_note(&id).await?;
            println!("deleted {id}");
        }
    }

    ctx.save()?;
    Ok(())
}
