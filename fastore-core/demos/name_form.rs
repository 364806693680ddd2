//! A two-field form sharing one store.
//!
//! Input observers write `first`/`last`, display observers read them, and a
//! container observer holds only the reset handle. The state persists in a
//! directory given as the first argument (a temp directory otherwise), so a
//! second run starts from where the first left off.
//!
//! Run with `RUST_LOG=fastore_core=debug` to see the store's log events.

use std::sync::Arc;

use fastore_core::{
    create_store, Binding, Context, FileStorage, Resetter, StoreError, StoreFamily,
};
use tracing_subscriber::EnvFilter;

fastore_core::state! {
    #[derive(Debug, PartialEq)]
    pub struct Name / NamePatch {
        pub first: String,
        pub last: String,
    }
}

#[derive(Clone, Copy)]
enum Field {
    First,
    Last,
}

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::First => "first",
            Field::Last => "last",
        }
    }

    fn read(self, name: &Name) -> String {
        match self {
            Field::First => name.first.clone(),
            Field::Last => name.last.clone(),
        }
    }

    fn patch(self, value: &str) -> NamePatch {
        match self {
            Field::First => NamePatch::default().first(value),
            Field::Last => NamePatch::default().last(value),
        }
    }
}

struct TextInput {
    field: Field,
    binding: Binding<Name, String>,
}

impl TextInput {
    fn mount(family: &StoreFamily<Name>, ctx: &Context, field: Field) -> Result<Self, StoreError> {
        let binding = family.use_selector(ctx, move |s| field.read(s))?;
        Ok(Self { field, binding })
    }

    fn type_text(&self, value: &str) -> Result<(), StoreError> {
        self.binding.set(self.field.patch(value))
    }
}

struct Display {
    binding: Binding<Name, String>,
}

impl Display {
    fn mount(family: &StoreFamily<Name>, ctx: &Context, field: Field) -> Result<Self, StoreError> {
        let binding = family.use_selector(ctx, move |s| field.read(s))?;
        let label = field.label();
        binding.on_change(move |value| println!("  [display] {label}: {value}"));
        Ok(Self { binding })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("fastore-name-form"));
    let storage = Arc::new(FileStorage::open(&dir)?);

    let family = create_store(
        Name {
            first: String::new(),
            last: String::new(),
        },
        Some("fastContext"),
    )
    .with_storage(storage);

    let app = family.activate()?;
    let ctx = app.provide(&Context::root());

    let reset: Resetter<Name> = family.use_reset(&ctx)?;
    let inputs = [
        TextInput::mount(&family, &ctx, Field::First)?,
        TextInput::mount(&family, &ctx, Field::Last)?,
    ];
    let displays = [
        Display::mount(&family, &ctx, Field::First)?,
        Display::mount(&family, &ctx, Field::Last)?,
    ];

    println!("restored: {:?}", *app.engine().get());

    println!("typing into first");
    inputs[0].type_text("Ada")?;
    println!("typing into last");
    inputs[1].type_text("Lovelace")?;

    for display in &displays {
        println!(
            "  recomputed {} times, re-rendered {} times",
            display.binding.recompute_count(),
            display.binding.change_count()
        );
    }

    if std::env::args().any(|arg| arg == "--reset") {
        println!("reset");
        reset.reset()?;
    }

    println!("final: {:?}", *app.engine().get());
    Ok(())
}
