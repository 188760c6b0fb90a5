//! Interactive till session.
//!
//! Reads one command per line, applies it to the session state and writes
//! the reply. Errors are shown and the session carries on.

use std::io::{BufRead, Write};

use anyhow::{bail, Context};

use super::{printer, reports, Session};
use crate::models::PaymentMethod;
use crate::pricing::{format_money, tax_label};
use crate::print::layout_for;
use crate::receipt_renderer;
use crate::state::{Action, AppState, Outcome};

const PROMPT: &str = "till> ";
const HISTORY_LINES: usize = 10;

const HELP: &str = "\
Commands:
  cats                     list categories
  cat <LABEL>              switch category
  ls                       products in the current category
  add <ID|#> [QTY]         add to cart (# is the number shown by ls)
  dec <ID>                 remove one
  qty <ID> <N>             set quantity (0 removes)
  rm <ID>                  remove line
  clear                    empty the cart
  cart                     show cart and totals
  pay <cash|upi|card>      checkout
  print                    print the last receipt
  done                     dismiss the last receipt
  connect | disconnect     Bluetooth printer
  history                  recent bills
  report                   today's report
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum TillCommand {
    Help,
    Categories,
    Category(String),
    Menu,
    Add { product: String, quantity: u32 },
    Decrement(String),
    Quantity { product: String, quantity: u32 },
    Remove(String),
    Clear,
    Cart,
    Pay(PaymentMethod),
    Print,
    Done,
    Connect,
    Disconnect,
    History,
    Report,
    Quit,
}

// -- Parsing -----------------------------------------------------------------

fn required<'a>(arg: Option<&'a str>, usage: &str) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("usage: {usage}"))
}

fn parse_quantity(raw: &str) -> Result<u32, String> {
    raw.parse::<u32>()
        .map_err(|_| format!("Invalid quantity: {raw}"))
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<TillCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let first = words.next();
    let second = words.next();

    let command = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => TillCommand::Help,
        "cats" | "categories" => TillCommand::Categories,
        "cat" | "category" => {
            let rest: Vec<&str> = first.into_iter().chain(second).chain(words).collect();
            if rest.is_empty() {
                return Err("usage: cat <LABEL>".to_string());
            }
            TillCommand::Category(rest.join(" "))
        }
        "ls" | "menu" => TillCommand::Menu,
        "add" | "a" => TillCommand::Add {
            product: required(first, "add <ID|#> [QTY]")?.to_string(),
            quantity: second.map(parse_quantity).transpose()?.unwrap_or(1),
        },
        "dec" | "-" => TillCommand::Decrement(required(first, "dec <ID>")?.to_string()),
        "qty" => TillCommand::Quantity {
            product: required(first, "qty <ID> <N>")?.to_string(),
            quantity: parse_quantity(required(second, "qty <ID> <N>")?)?,
        },
        "rm" | "remove" => TillCommand::Remove(required(first, "rm <ID>")?.to_string()),
        "clear" => TillCommand::Clear,
        "cart" => TillCommand::Cart,
        "pay" | "checkout" => TillCommand::Pay(required(first, "pay <cash|upi|card>")?.parse()?),
        "print" => TillCommand::Print,
        "done" | "new" => TillCommand::Done,
        "connect" => TillCommand::Connect,
        "disconnect" => TillCommand::Disconnect,
        "history" => TillCommand::History,
        "report" => TillCommand::Report,
        "quit" | "exit" | "q" => TillCommand::Quit,
        other => return Err(format!("Unknown command: {other} (try `help`)")),
    };
    Ok(Some(command))
}

// -- Rendering ---------------------------------------------------------------

pub fn render_cart(state: &AppState) -> String {
    let cart = state.cart();
    if cart.is_empty() {
        return "Cart is empty\n".to_string();
    }
    let mut out = String::new();
    for line in cart.lines() {
        out.push_str(&format!(
            "{:<6} {:<26} {:>3} x {:>7} = {:>8}\n",
            line.product.id,
            line.product.name,
            line.quantity,
            format_money(line.product.price),
            format_money(line.line_total())
        ));
    }
    let totals = state.cart_totals();
    out.push_str(&format!("{:<48}{:>10}\n", "Subtotal", format_money(totals.subtotal)));
    out.push_str(&format!(
        "{:<48}{:>10}\n",
        tax_label(state.config().tax_rate),
        format_money(totals.tax)
    ));
    out.push_str(&format!("{:<44}Rs. {:>10}\n", "TOTAL", format_money(totals.total)));
    out.push_str(&format!("{} items\n", cart.item_count()));
    out
}

fn render_menu(state: &AppState) -> String {
    let mut out = format!("{}\n", state.active_category());
    for (idx, product) in state.visible_products().iter().enumerate() {
        let in_cart = state.cart().quantity_of(&product.id);
        let marker = if in_cart > 0 {
            format!("  [x{in_cart}]")
        } else {
            String::new()
        };
        out.push_str(&format!(
            "{:>3}. {:<6} {:<26} Rs. {:>7}{marker}\n",
            idx + 1,
            product.id,
            product.name,
            format_money(product.price)
        ));
    }
    out
}

/// Product id for `token`: a listed number from `ls` or an id.
fn resolve_product(state: &AppState, token: &str) -> String {
    let visible = state.visible_products();
    token
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| visible.get(idx))
        .map(|p| p.id.clone())
        .unwrap_or_else(|| token.to_string())
}

fn quantity_reply(state: &AppState, product_id: &str, quantity: u32) -> String {
    let name = state
        .catalog()
        .get(product_id)
        .map(|p| p.name.as_str())
        .unwrap_or(product_id);
    let totals = state.cart_totals();
    format!(
        "{name}: {quantity} in cart. Total Rs. {}",
        format_money(totals.total)
    )
}

// -- Execution ---------------------------------------------------------------

async fn execute(session: &mut Session, command: TillCommand) -> anyhow::Result<String> {
    let state = &mut session.state;
    let reply = match command {
        TillCommand::Help => HELP.to_string(),
        TillCommand::Quit => String::new(),
        TillCommand::Categories => {
            let active = state.active_category().to_string();
            state
                .catalog()
                .categories()
                .iter()
                .map(|c| if *c == active { format!("* {c}") } else { format!("  {c}") })
                .collect::<Vec<_>>()
                .join("\n")
        }
        TillCommand::Category(label) => {
            state.apply(Action::SelectCategory(label))?;
            render_menu(state)
        }
        TillCommand::Menu => render_menu(state),
        TillCommand::Add { product, quantity } => {
            if quantity == 0 {
                bail!("Quantity must be at least 1");
            }
            let product_id = resolve_product(state, &product);
            let Some(target) = state.cart().quantity_of(&product_id).checked_add(quantity) else {
                bail!("Quantity too large for {product_id}");
            };
            match state.apply(Action::SetQuantity {
                product_id: product_id.clone(),
                quantity: target,
            })? {
                Outcome::CartUpdated { quantity, .. } => quantity_reply(state, &product_id, quantity),
                other => format!("{other:?}"),
            }
        }
        TillCommand::Decrement(product) => {
            let product_id = resolve_product(state, &product);
            match state.apply(Action::Decrement(product_id.clone()))? {
                Outcome::CartUpdated { quantity, .. } => quantity_reply(state, &product_id, quantity),
                other => format!("{other:?}"),
            }
        }
        TillCommand::Quantity { product, quantity } => {
            let product_id = resolve_product(state, &product);
            match state.apply(Action::SetQuantity {
                product_id: product_id.clone(),
                quantity,
            })? {
                Outcome::CartUpdated { quantity, .. } => quantity_reply(state, &product_id, quantity),
                other => format!("{other:?}"),
            }
        }
        TillCommand::Remove(product) => {
            let product_id = resolve_product(state, &product);
            state.apply(Action::RemoveLine(product_id.clone()))?;
            quantity_reply(state, &product_id, 0)
        }
        TillCommand::Clear => {
            state.apply(Action::ClearCart)?;
            "Cart cleared".to_string()
        }
        TillCommand::Cart => render_cart(state),
        TillCommand::Pay(method) => match state.apply(Action::Checkout(method))? {
            Outcome::SaleCompleted(sale) => {
                let layout = layout_for(state.config(), state.printer_config());
                format!(
                    "{}Type `print` to print the receipt or `done` for the next customer.",
                    receipt_renderer::render_text(&sale, &layout)
                )
            }
            other => format!("{other:?}"),
        },
        TillCommand::Print => printer::print_current(session).await?,
        TillCommand::Done => {
            session.state.apply(Action::DismissReceipt)?;
            "Ready for the next customer".to_string()
        }
        TillCommand::Connect => printer::connect(session).await?,
        TillCommand::Disconnect => printer::disconnect(session)?,
        TillCommand::History => reports::history(&session.state, HISTORY_LINES),
        TillCommand::Report => {
            let today = chrono::Utc::now()
                .with_timezone(&session.state.config().utc_offset())
                .date_naive();
            reports::report(&session.state, Some(today), false)?
        }
    };
    Ok(reply)
}

/// Run the till loop until `quit` or end of input.
pub async fn run<R: BufRead, W: Write>(session: &mut Session, input: R, out: &mut W) -> anyhow::Result<()> {
    let store = session.state.config().store.name.clone();
    writeln!(out, "{store} till. Next bill #{}. Type `help` for commands.", session.state.ledger().next_bill_no())?;
    write!(out, "{}", render_menu(&session.state))?;
    write!(out, "{PROMPT}")?;
    out.flush()?;

    for line in input.lines() {
        let line = line.context("reading till input")?;
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(TillCommand::Quit)) => break,
            Ok(Some(command)) => match execute(session, command).await {
                Ok(reply) => writeln!(out, "{}", reply.trim_end())?,
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Err(e) => writeln!(out, "error: {e}")?,
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }

    if !session.state.cart().is_empty() {
        writeln!(
            out,
            "Note: {} items left in the cart were not billed",
            session.state.cart().item_count()
        )?;
    }
    Ok(())
}
