// Per-tick rules that touch more than one kind of entity.

pub mod combat;
