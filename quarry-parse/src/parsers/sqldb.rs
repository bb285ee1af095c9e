//! SQL database discovery from migration directories.
//!
//! A package with a `migrations` subdirectory declares one database named
//! after the package. Migration files follow the grammar
//! `<number>_<description>.(up|down).sql`; only up migrations are recorded,
//! and numbers must be contiguous starting from 1.
//!
//! Packages that do not look like services get lenient treatment: a stray
//! `migrations` folder under, say, a docs directory should not fail the
//! run, so problems there skip the database instead of reporting errors.

use std::io;
use std::path::Path;

use quarry_core::Span;
use quarry_diag::Diagnostic;
use quarry_graph::{
    Bind, BindKind, BindTarget, Migration, Resource, ResourceData, ResourceId, ResourceKind,
    SqlDatabase,
};

use crate::codes;
use crate::error::FatalError;
use crate::pass::Pass;

const MIGRATIONS_DIR: &str = "migrations";

pub fn run(pass: &Pass<'_>) {
    if !pass.pkg.has_subdir(MIGRATIONS_DIR) {
        return;
    }

    let dir = pass.pkg.fs_path.join(MIGRATIONS_DIR);
    let Some(rel_dir) = pass.app_root.relativize(&dir) else {
        pass.registry.abort(FatalError::MigrationsOutsideRoot {
            package: pass.pkg.name.clone(),
            dir: dir.display().to_string(),
        });
        return;
    };

    let mut diags = Vec::new();
    let migrations = match read_migrations(&dir, &rel_dir, &mut diags) {
        Ok(migrations) => migrations,
        Err(err) => {
            pass.diags.add(
                Diagnostic::error(
                    codes::MIGRATIONS_UNREADABLE,
                    format!("cannot read migration directory of package '{}'", pass.pkg.name),
                    Span::file(&rel_dir),
                )
                .with_label(err.to_string()),
            );
            return;
        }
    };

    // Problems in a non-service package skip the database quietly.
    if !diags.is_empty() {
        if pass.is_likely_service() {
            for d in diags {
                pass.diags.add(d.with_doc(pass.docs_url("databases/migrations")));
            }
        }
        return;
    }

    // A clean but empty migration folder declares nothing, and neither does
    // one in a package that is not a service.
    if migrations.is_empty() || !pass.is_likely_service() {
        return;
    }

    let id = ResourceId::package_scoped(ResourceKind::SqlDatabase, &pass.pkg.name);
    let resource = Resource {
        id: id.clone(),
        name: pass.pkg.name.clone(),
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc: None,
        range: Span::file(&rel_dir),
        data: ResourceData::SqlDatabase(SqlDatabase {
            migration_dir: rel_dir.clone(),
            migrations,
        }),
    };
    if pass.registry.register(resource) {
        // The declaring package uses its own database without naming it.
        pass.registry.add_bind(Bind {
            target: BindTarget::Id(id),
            site: Span::file(rel_dir),
            kind: BindKind::Implicit,
        });
    }
}

/// Read and validate the migration set of one directory.
///
/// Collects all filename and numbering problems into `diags` instead of
/// stopping at the first.
fn read_migrations(
    dir: &Path,
    rel_dir: &str,
    diags: &mut Vec<Diagnostic>,
) -> io::Result<Vec<Migration>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut migrations = Vec::new();
    for entry in &entries {
        if entry.path().is_dir() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        let ext_is_sql = Path::new(&filename)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("sql"));
        if !ext_is_sql {
            continue;
        }

        let file_span = Span::file(format!("{rel_dir}/{filename}"));
        match parse_filename(&filename) {
            Some((number, description, up)) => {
                if !up {
                    continue;
                }
                if number == 0 {
                    diags.push(
                        Diagnostic::error(
                            codes::INVALID_MIGRATION_NUMBER,
                            format!("invalid migration number in '{filename}'"),
                            file_span,
                        )
                        .with_hint("migration numbers start at 1"),
                    );
                    continue;
                }
                migrations.push(Migration {
                    filename,
                    number,
                    description,
                });
            }
            None => {
                diags.push(
                    Diagnostic::error(
                        codes::INVALID_MIGRATION_FILENAME,
                        format!("invalid migration filename '{filename}'"),
                        file_span,
                    )
                    .with_hint(
                        "migration files must be named '<number>_<description>.up.sql'",
                    ),
                );
            }
        }
    }

    migrations.sort_by_key(|m| m.number);

    let mut duplicates = false;
    for pair in migrations.windows(2) {
        if pair[0].number == pair[1].number {
            duplicates = true;
            diags.push(Diagnostic::error(
                codes::DUPLICATE_MIGRATION,
                format!("duplicate migration with number {}", pair[1].number),
                Span::file(format!("{rel_dir}/{}", pair[1].filename)),
            ));
        }
    }

    // A duplicate throws every later index off, so the gap check only means
    // anything on a duplicate-free set.
    if !duplicates {
        for (i, m) in migrations.iter().enumerate() {
            let expected = (i + 1) as u64;
            if m.number > expected {
                diags.push(
                    Diagnostic::error(
                        codes::MISSING_MIGRATION,
                        format!("missing migration with number {expected}"),
                        Span::file(format!("{rel_dir}/{}", m.filename)),
                    )
                    .with_hint("migration numbers must be contiguous"),
                );
                break;
            }
        }
    }

    Ok(migrations)
}

/// Parse `<number>_<description>.(up|down).sql`.
///
/// Returns `(number, description, is_up)`, or None when the name does not
/// match the grammar. The number must be all digits, the description
/// non-empty and free of dots, and the `up`/`down` suffix lowercase.
fn parse_filename(filename: &str) -> Option<(u64, String, bool)> {
    let (stem, up) = if let Some(stem) = filename.strip_suffix(".up.sql") {
        (stem, true)
    } else if let Some(stem) = filename.strip_suffix(".down.sql") {
        (stem, false)
    } else {
        return None;
    };

    let (digits, description) = stem.split_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if description.is_empty() || description.contains('.') {
        return None;
    }
    let number = digits.parse().ok()?;
    Some((number, description.to_string(), up))
}
