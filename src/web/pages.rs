//! Server-rendered pages.

use maud::{html, Markup, DOCTYPE};

fn layout(title: &str, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " - dotmoe" }
            }
            body {
                main class="container" { (content) }
            }
        }
    }
}

/// Moderator login form.
#[must_use]
pub fn login_page(endpoint: &str, error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Login" }
        @if let Some(error) = error {
            div class="alert alert-danger" role="alert" { (error) }
        }
        form method="post" action={ (endpoint) "/login" } {
            label for="email" { "Email" }
            input type="email" id="email" name="email" required;
            label for="password" { "Password" }
            input type="password" id="password" name="password" required;
            button type="submit" { "Login" }
        }
    };
    layout("Login", &content)
}

/// Curation client shell: key rules, preview slots and metadata fields.
#[must_use]
pub fn client_page(endpoint: &str, email: &str) -> Markup {
    let content = html! {
        header {
            span { "Logged in as " strong { (email) } }
            a href={ (endpoint) "/logout" } { "Logout" }
        }
        section id="rules" {
            h2 { "Rules" }
            ul {
                li { kbd { "Shift" } " skip" }
                li { kbd { "Enter" } " approve" }
                li { kbd { "E" } " flag as suggestive (a warning message is required)" }
                li { kbd { "Q" } " switch preview resolution" }
            }
        }
        img class="content" alt="Current post";
        dl id="metadata" {
            dt { "Provider" } dd id="provider" {}
            dt { "Page" } dd id="page" {}
            dt { "Source" } dd id="source" {}
            dt { "Author" } dd id="author" {}
            dt { "Size" } dd id="size" {}
            dt { "Images left" } dd id="imagesLeft" {}
            dt { "Approved" } dd id="approved" { "0" }
        }
        input id="customMessage" placeholder="Custom message";
        input id="warningMessage" placeholder="Warning message";
        img id="lastApproved" alt="Last approved";
    };
    layout("Client", &content)
}
