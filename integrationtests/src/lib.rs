pub mod lndmock;
