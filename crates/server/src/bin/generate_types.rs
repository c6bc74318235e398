use std::{env, fs};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        utils::pagination::Page::<()>::decl(),
        utils::pagination::PageLinks::decl(),
        db::models::knowledge::Visibility::decl(),
        db::models::knowledge::Knowledge::decl(),
        db::models::knowledge::CreateKnowledge::decl(),
        db::models::knowledge::UpdateKnowledge::decl(),
        db::models::history::KnowledgeHistory::decl(),
        db::models::comment::CreateComment::decl(),
        db::models::comment::UpdateComment::decl(),
        db::models::like::Like::decl(),
        db::models::tag::Tag::decl(),
        db::models::tag::TagWithCount::decl(),
        db::models::stock::Stock::decl(),
        db::models::stock::CreateStock::decl(),
        services::services::access_control::Role::decl(),
        services::services::config::ExposeType::decl(),
        services::services::config::PageLimits::decl(),
        services::services::knowledge::KnowledgeDetail::decl(),
        services::services::comment::CommentView::decl(),
        services::services::like::LikeToggle::decl(),
        server::routes::knowledge::ReplaceEditors::decl(),
        server::routes::admin::SystemInfo::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {decl}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("// Generated by `cargo run --bin generate_types`. Do not edit.\n\n{body}\n")
}

fn main() {
    let content = generate_types_content();
    match env::args().nth(1) {
        Some(path) => {
            if let Err(e) = fs::write(&path, content) {
                eprintln!("failed to write {path}: {e}");
                std::process::exit(1);
            }
            println!("wrote {path}");
        }
        None => print!("{content}"),
    }
}
