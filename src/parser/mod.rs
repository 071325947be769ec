//! Message-body parsing: DOM construction, per-type rewriting, HTML/text
//! rendering, and per-conversation statistics. See `skypedata.py`'s
//! `MessageParser` for the module this whole tree is grounded on.

pub mod dom;
pub mod emoticons;
pub mod message_types;
pub mod render_html;
pub mod render_text;
pub mod rewrite;
pub mod stats;

pub use dom::{make_xml, DomNode};
pub use render_html::{dom_to_html, HtmlOptions};
pub use render_text::{dom_to_text, wrap_dos};
pub use rewrite::{parse_message_dom, process_message_edit, EditInfo, MessageContext, NameResolver, ParsedMessage, TransferRow};
pub use stats::Stats;
