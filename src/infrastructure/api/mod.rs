pub mod audiora;
