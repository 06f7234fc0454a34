mod campaigns;
mod health_check;
mod helpers;
